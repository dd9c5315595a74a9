use std::io::Write;

use byteorder::{BigEndian, WriteBytesExt};

use crate::bytes::{ByteCursor, ByteGetter};
use crate::error::{FormatError, Result};
use crate::write::write_string;

/// Gene annotation attached to a reference interval
///
/// On disk a gene item is a strand byte (`0` forward, `1` reverse) followed by an `i32`
/// count of protein ids, each stored as an `i32` length-prefixed UTF-8 string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneItem {
    reverse: bool,
    protein_ids: Vec<String>,
}
impl GeneItem {
    #[must_use]
    pub fn new(reverse: bool, protein_ids: Vec<String>) -> Self {
        Self {
            reverse,
            protein_ids,
        }
    }

    /// Whether the gene lies on the reverse strand
    #[must_use]
    pub fn is_reverse(&self) -> bool {
        self.reverse
    }

    #[must_use]
    pub fn protein_ids(&self) -> &[String] {
        &self.protein_ids
    }

    /// Protein ids as they appear in an annotated reference name
    #[must_use]
    pub fn protein_label(&self) -> String {
        self.protein_ids.join(",")
    }

    pub fn write_bytes<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(u8::from(self.reverse))?;
        writer.write_i32::<BigEndian>(self.protein_ids.len() as i32)?;
        for id in &self.protein_ids {
            write_string(writer, id)?;
        }
        Ok(())
    }

    pub fn read_bytes<G: ByteGetter + ?Sized>(cursor: &mut ByteCursor<'_, G>) -> Result<Self> {
        let pos = cursor.position();
        let reverse = match cursor.read_u8("strand flag")? {
            0 => false,
            1 => true,
            flag => return Err(FormatError::InvalidStrandFlag(flag, pos).into()),
        };
        let num_ids = cursor.read_count("protein id count")?;
        let mut protein_ids = Vec::with_capacity(cursor.capacity_for(num_ids, 4));
        for _ in 0..num_ids {
            protein_ids.push(cursor.read_string("protein id")?);
        }
        Ok(Self {
            reverse,
            protein_ids,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;
    use crate::Error;
    use crate::bytes::MappedByteStore;

    fn decode(bytes: &[u8]) -> Result<GeneItem> {
        let mut file = NamedTempFile::new()?;
        file.write_all(bytes)?;
        file.flush()?;
        let store = MappedByteStore::new(file.path())?;
        GeneItem::read_bytes(&mut ByteCursor::new(&store))
    }

    #[test]
    fn test_layout() -> Result<()> {
        let item = GeneItem::new(true, vec!["WP_1".into()]);
        let mut buf = Vec::new();
        item.write_bytes(&mut buf)?;

        let mut expected = vec![1u8];
        expected.extend_from_slice(&1i32.to_be_bytes());
        expected.extend_from_slice(&4i32.to_be_bytes());
        expected.extend_from_slice(b"WP_1");
        assert_eq!(buf, expected);
        Ok(())
    }

    #[test]
    fn test_decode_multiple_ids() -> Result<()> {
        let item = GeneItem::new(false, vec!["NP_001".into(), "XP_002.1".into(), String::new()]);
        let mut buf = Vec::new();
        item.write_bytes(&mut buf)?;
        assert_eq!(decode(&buf)?, item);
        assert_eq!(item.protein_label(), "NP_001,XP_002.1,");
        Ok(())
    }

    #[test]
    fn test_invalid_strand_flag() {
        let mut bytes = vec![7u8];
        bytes.extend_from_slice(&0i32.to_be_bytes());
        assert!(matches!(
            decode(&bytes),
            Err(Error::FormatError(FormatError::InvalidStrandFlag(7, 0)))
        ));
    }

    #[test]
    fn test_truncated_protein_id() {
        let mut bytes = vec![0u8];
        bytes.extend_from_slice(&1i32.to_be_bytes());
        bytes.extend_from_slice(&10i32.to_be_bytes());
        bytes.extend_from_slice(b"short");
        assert!(matches!(
            decode(&bytes),
            Err(Error::FormatError(FormatError::Truncated("protein id")))
        ));
    }

    #[test]
    fn test_oversized_id_count_is_truncated() {
        let mut bytes = vec![1u8];
        bytes.extend_from_slice(&i32::MAX.to_be_bytes());
        bytes.extend_from_slice(&2i32.to_be_bytes());
        bytes.extend_from_slice(b"P1");
        assert!(matches!(
            decode(&bytes),
            Err(Error::FormatError(FormatError::Truncated("protein id")))
        ));
    }
}
