#![no_main]

use libfuzzer_sys::fuzz_target;
use xstore_core::varint;

fuzz_target!(|input: (u64, u64)| {
    let (a, b) = input;

    // only the fixed-width encoding sorts bytewise
    let fa = varint::encode_fixed(a);
    let fb = varint::encode_fixed(b);
    assert_eq!(a.cmp(&b), fa.cmp(&fb));

    let mut offset = 0;
    assert_eq!(varint::decode_fixed(&fa, &mut offset), Ok(a));
    assert_eq!(offset, varint::FIXED_SIZE);

    for x in [a, b] {
        let encoded = varint::encode_to_vec(x);
        assert_eq!(encoded.len(), varint::size(x));
        let mut offset = 0;
        assert_eq!(varint::decode(&encoded, &mut offset), Ok(x));
        assert_eq!(offset, encoded.len());
    }
});
