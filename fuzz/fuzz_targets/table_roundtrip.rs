#![no_main]
use arbitrary::{Arbitrary, Unstructured};
use chd_table::{coding::Encode, Builder, Error, Table};
use libfuzzer_sys::fuzz_target;
use rand::SeedableRng;
use std::collections::HashMap;

fuzz_target!(|data: &[u8]| {
    let mut unstructured = Unstructured::new(data);

    let seed = u64::arbitrary(&mut unstructured).unwrap_or_default();

    if let Ok(items) = <Vec<(Vec<u8>, Vec<u8>)> as Arbitrary>::arbitrary(&mut unstructured) {
        let mut builder = Builder::new();
        builder.extend(items.iter().cloned());

        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(seed);

        let table = match builder.build_with_rng(&mut rng) {
            Ok(table) => table,
            Err(Error::DuplicateKey(key)) => {
                assert!(items.iter().filter(|(k, _)| *k == *key).count() > 1);
                return;
            }
            Err(e) => panic!("build failed: {e}"),
        };

        let expected = items.into_iter().collect::<HashMap<_, _>>();
        assert_eq!(expected.len(), table.len());

        let bytes = table.encode_into_vec().unwrap();
        let view = Table::from_slice(&bytes).unwrap();
        view.verify().unwrap();

        for (key, value) in &expected {
            assert_eq!(Some(value.as_slice()), table.get(key));
            assert_eq!(Some(value.as_slice()), view.get(key));
        }
    }
});
