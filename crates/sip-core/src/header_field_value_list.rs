use crate::header_field_value::HeaderFieldValue;

/// All occurrences of one header name, in wire order.
///
/// Comma-separated values of multi-valued headers are split at framing time,
/// so each entry here is exactly one value regardless of how the sender
/// grouped them into lines.
#[derive(Debug, Clone, Default)]
pub struct HeaderFieldValueList {
    values: Vec<HeaderFieldValue>,
}

impl HeaderFieldValueList {
    pub fn new() -> Self {
        HeaderFieldValueList { values: Vec::new() }
    }

    pub fn with_value(value: HeaderFieldValue) -> Self {
        HeaderFieldValueList {
            values: vec![value],
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn front(&self) -> Option<&HeaderFieldValue> {
        self.values.first()
    }

    pub fn front_mut(&mut self) -> Option<&mut HeaderFieldValue> {
        self.values.first_mut()
    }

    pub fn get(&self, index: usize) -> Option<&HeaderFieldValue> {
        self.values.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut HeaderFieldValue> {
        self.values.get_mut(index)
    }

    pub fn push_back(&mut self, value: HeaderFieldValue) {
        self.values.push(value);
    }

    pub fn push_front(&mut self, value: HeaderFieldValue) {
        self.values.insert(0, value);
    }

    pub fn pop_front(&mut self) -> Option<HeaderFieldValue> {
        if self.values.is_empty() {
            None
        } else {
            Some(self.values.remove(0))
        }
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn iter(&self) -> std::slice::Iter<'_, HeaderFieldValue> {
        self.values.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, HeaderFieldValue> {
        self.values.iter_mut()
    }

    /// Write one `name: value` line per entry.
    pub fn encode(&self, name: &str, out: &mut Vec<u8>) {
        for value in &self.values {
            out.extend_from_slice(name.as_bytes());
            out.extend_from_slice(b": ");
            value.encode(out);
            out.extend_from_slice(b"\r\n");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn test_order_preserved() {
        let mut list = HeaderFieldValueList::new();
        list.push_back(HeaderFieldValue::from_raw(Bytes::from_static(b"<sip:b>")));
        list.push_back(HeaderFieldValue::from_raw(Bytes::from_static(b"<sip:c>")));
        list.push_front(HeaderFieldValue::from_raw(Bytes::from_static(b"<sip:a>")));

        let raws: Vec<&[u8]> = list.iter().map(|v| &v.raw()[..]).collect();
        assert_eq!(raws, vec![&b"<sip:a>"[..], b"<sip:b>", b"<sip:c>"]);

        let mut out = Vec::new();
        list.encode("Route", &mut out);
        assert_eq!(out, b"Route: <sip:a>\r\nRoute: <sip:b>\r\nRoute: <sip:c>\r\n");

        assert_eq!(list.pop_front().unwrap().raw(), &Bytes::from_static(b"<sip:a>"));
        assert_eq!(list.len(), 2);
    }
}
