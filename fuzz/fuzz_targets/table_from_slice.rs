#![no_main]
use chd_table::{
    coding::{Decode, Encode},
    table::reader::{Borrowing, Copying},
    Table,
};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let borrowed = Table::from_slice_with::<Borrowing>(data);
    let copied = Table::from_slice_with::<Copying>(data);
    let decoded = Table::decode_from(&mut &data[..]);

    assert_eq!(borrowed.is_ok(), copied.is_ok());
    assert_eq!(borrowed.is_ok(), decoded.is_ok());

    if let (Ok(borrowed), Ok(decoded)) = (borrowed, decoded) {
        assert_eq!(
            borrowed.iter().collect::<Vec<_>>(),
            decoded.iter().collect::<Vec<_>>()
        );

        for (key, _) in &borrowed {
            assert_eq!(borrowed.get(key), decoded.get(key));
        }

        let _ = borrowed.verify();

        let bytes = borrowed.encode_into_vec().unwrap();
        assert_eq!(bytes, decoded.encode_into_vec().unwrap());
    }
});
