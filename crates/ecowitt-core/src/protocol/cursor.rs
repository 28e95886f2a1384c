//! Bounds-checked reader over a reply payload.

use super::error::ReplyError;

#[derive(Debug, Clone)]
pub struct PayloadCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> PayloadCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn take_byte(&mut self) -> Result<u8, ReplyError> {
        let bytes = self.take_bytes(1)?;
        Ok(bytes[0])
    }

    pub fn take_bytes(&mut self, n: usize) -> Result<&'a [u8], ReplyError> {
        if n > self.remaining() {
            return Err(ReplyError::Truncated {
                needed: n,
                available: self.remaining(),
            });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn take_array<const N: usize>(&mut self) -> Result<[u8; N], ReplyError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take_bytes(N)?);
        Ok(out)
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn consumed(&self) -> usize {
        self.pos
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_sequence() {
        let data = [1, 2, 3, 4, 5];
        let mut cursor = PayloadCursor::new(&data);
        assert_eq!(cursor.take_byte().unwrap(), 1);
        assert_eq!(cursor.take_bytes(2).unwrap(), &[2, 3]);
        assert_eq!(cursor.remaining(), 2);
        assert_eq!(cursor.take_array::<2>().unwrap(), [4, 5]);
        assert_eq!(cursor.remaining(), 0);
        assert_eq!(cursor.consumed(), 5);
    }

    #[test]
    fn test_underflow_is_explicit() {
        let data = [9, 8];
        let mut cursor = PayloadCursor::new(&data);
        let err = cursor.take_bytes(3).unwrap_err();
        assert!(matches!(
            err,
            ReplyError::Truncated {
                needed: 3,
                available: 2
            }
        ));
        // A failed take leaves the cursor where it was.
        assert_eq!(cursor.remaining(), 2);

        cursor.take_bytes(2).unwrap();
        assert!(cursor.take_byte().is_err());
    }
}
