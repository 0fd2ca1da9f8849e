use arbitrary::Arbitrary;

/// The components of a storage address together with some bytes that follow it on the stream.
#[derive(Debug, Arbitrary)]
pub struct AddressRun {
    pub page: u32,
    pub tid: i16,
    pub flags: i16,
    pub trailer: Vec<u8>,
}

/// A sequence of values to decode from arbitrary bytes.
#[derive(Debug, Arbitrary)]
pub enum Read {
    U64,
    U32,
    U16,
    I16,
    Fixed,
    Skip(u8),
    Bytes(u8),
}
