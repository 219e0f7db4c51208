use std::io::{Read, Write};

use byteorder::{BigEndian, ByteOrder, ReadBytesExt, WriteBytesExt};

use crate::base::Posting;

/// Writes a posting as `tf:u32, docid:u32`
pub fn write_posting<W: Write + ?Sized>(writer: &mut W, posting: &Posting) -> std::io::Result<()> {
    writer.write_u32::<BigEndian>(posting.tf)?;
    writer.write_u32::<BigEndian>(posting.docid)?;
    Ok(())
}

pub fn read_posting<R: Read + ?Sized>(reader: &mut R) -> std::io::Result<Posting> {
    let tf = reader.read_u32::<BigEndian>()?;
    let docid = reader.read_u32::<BigEndian>()?;
    Ok(Posting { tf, docid })
}

/// Decodes the `ix`-th posting of a block
#[inline]
pub fn decode_posting(block: &[u8], ix: usize) -> Posting {
    let start = ix * Posting::SIZE;
    Posting {
        tf: BigEndian::read_u32(&block[start..start + 4]),
        docid: BigEndian::read_u32(&block[start + 4..start + 8]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let mut data = Vec::new();
        write_posting(&mut data, &Posting { tf: 3, docid: 258 }).unwrap();
        assert_eq!(data, vec![0, 0, 0, 3, 0, 0, 1, 2]);

        assert_eq!(decode_posting(&data, 0), Posting { tf: 3, docid: 258 });
        assert_eq!(
            read_posting(&mut data.as_slice()).unwrap(),
            Posting { tf: 3, docid: 258 }
        );
    }
}
