#![no_main]

mod common;

use common::AddressRun;
use libfuzzer_sys::fuzz_target;
use xstore_core::{address, ByteReader, ByteWriter};

fuzz_target!(|run: AddressRun| {
    let AddressRun {
        page,
        tid,
        flags,
        trailer,
    } = run;

    let ptr = address::encode_with_flags(page, tid, flags);
    assert_eq!(address::page_of(ptr), page);
    assert_eq!(address::tid_of(ptr), tid);
    assert_eq!(address::flags_of(ptr), flags);
    assert!(address::addr_eq(ptr, address::encode(page, tid)));

    let mut writer = ByteWriter::new();
    address::write(ptr, &mut writer);
    writer.write_bytes(&trailer);
    let bytes = writer.into_inner();

    let mut reader = ByteReader::new(&bytes);
    assert_eq!(address::read(&mut reader), Ok(ptr));
    assert_eq!(reader.read_bytes(trailer.len()), Ok(&trailer[..]));
    assert!(reader.is_exhausted());
});
