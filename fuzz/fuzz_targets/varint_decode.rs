#![no_main]

mod common;

use common::Read;
use libfuzzer_sys::fuzz_target;
use xstore_core::{varint, ByteReader};

fuzz_target!(|input: (Vec<u8>, Vec<Read>)| {
    let (bytes, reads) = input;

    let mut offset = 0;
    while offset < bytes.len() {
        let before = offset;
        match varint::decode(&bytes, &mut offset) {
            Ok(value) => {
                assert!(offset > before && offset <= bytes.len());
                // non-canonical encodings may be longer than the canonical one
                assert!(varint::size(value) <= offset - before);
            }
            Err(_) => {
                assert_eq!(offset, before);
                break;
            }
        }
    }

    let mut reader = ByteReader::new(&bytes);
    for read in reads {
        let before = reader.position();
        let res = match read {
            Read::U64 => reader.read_u64().map(drop),
            Read::U32 => reader.read_u32().map(drop),
            Read::U16 => reader.read_u16().map(drop),
            Read::I16 => reader.read_i16().map(drop),
            Read::Fixed => reader.read_fixed_u64().map(drop),
            Read::Skip(n) => reader.skip_values(n as usize),
            Read::Bytes(n) => reader.read_bytes(n as usize).map(drop),
        };
        assert!(reader.position() <= bytes.len());
        if res.is_err() {
            assert_eq!(reader.position(), before);
        }
    }
});
