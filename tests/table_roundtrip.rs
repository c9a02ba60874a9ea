use chd_table::{
    coding::{Decode, Encode},
    table::reader::{Borrowing, Copying},
    Builder, Config, Table,
};
use std::io::{BufReader, BufWriter, Write};
use test_log::test;

fn assert_same(expected: &Table<'_>, actual: &Table<'_>) {
    assert_eq!(expected.len(), actual.len());
    assert_eq!(
        expected.seeds().collect::<Vec<_>>(),
        actual.seeds().collect::<Vec<_>>()
    );
    assert_eq!(
        expected.indices().collect::<Vec<_>>(),
        actual.indices().collect::<Vec<_>>()
    );
    assert_eq!(
        expected.iter().collect::<Vec<_>>(),
        actual.iter().collect::<Vec<_>>()
    );

    for (key, value) in expected {
        assert_eq!(Some(value), actual.get(key));
    }
}

fn words(count: usize) -> Builder {
    let mut builder = Builder::with_config(Config::default().rng_seed(1));
    builder.extend((0..count).map(|i| {
        let word = format!("word{i:08x}");
        (word.clone(), word)
    }));
    builder
}

#[test]
fn table_roundtrip_words() -> chd_table::Result<()> {
    let table = words(20_000).build()?;
    let bytes = table.encode_into_vec()?;

    let view = Table::from_slice(&bytes)?;
    assert!(view.is_borrowed());
    assert_same(&table, &view);

    let decoded = Table::decode_from(&mut &bytes[..])?;
    assert_same(&table, &decoded);

    // Re-encoding a read table is byte-identical
    assert_eq!(bytes, view.encode_into_vec()?);
    assert_eq!(bytes, decoded.encode_into_vec()?);

    Ok(())
}

#[test]
fn table_roundtrip_empty() -> chd_table::Result<()> {
    let table = Builder::new().build()?;
    let bytes = table.encode_into_vec()?;

    for read in [
        Table::from_slice_with::<Borrowing>(&bytes)?,
        Table::from_slice_with::<Copying>(&bytes)?,
        Table::decode_from(&mut &bytes[..])?,
    ] {
        assert_same(&table, &read);
        assert!(read.is_empty());
        assert_eq!(None, read.get(b"anything"));
        assert_eq!(0, read.iter().count());
    }

    Ok(())
}

#[test]
fn table_roundtrip_single() -> chd_table::Result<()> {
    let mut builder = Builder::new();
    builder.add("k", "v");

    let table = builder.build()?;
    let bytes = table.encode_into_vec()?;

    for read in [
        Table::from_slice_with::<Borrowing>(&bytes)?,
        Table::from_slice_with::<Copying>(&bytes)?,
        Table::decode_from(&mut &bytes[..])?,
    ] {
        assert_same(&table, &read);
        assert_eq!(1, read.len());
        assert_eq!(Some(&b"v"[..]), read.get(b"k"));
    }

    Ok(())
}

#[test]
fn table_roundtrip_trailing_bytes() -> chd_table::Result<()> {
    let table = words(100).build()?;
    let mut bytes = table.encode_into_vec()?;

    // NOTE: e.g. a page-aligned memory map
    bytes.resize(bytes.len() + 4_096, 0);

    let view = Table::from_slice(&bytes)?;
    assert_same(&table, &view);

    Ok(())
}

#[test]
fn table_roundtrip_file() -> chd_table::Result<()> {
    let folder = tempfile::tempdir()?;
    let path = folder.path().join("words.chd");

    let table = words(5_000).build()?;

    {
        let mut writer = BufWriter::new(std::fs::File::create(&path)?);
        table.encode_into(&mut writer)?;
        writer.flush()?;
    }

    let decoded = Table::decode_from(&mut BufReader::new(std::fs::File::open(&path)?))?;
    assert_same(&table, &decoded);

    let bytes = std::fs::read(&path)?;
    let view = Table::from_slice(&bytes)?;
    assert_same(&table, &view);

    let owned = view.into_owned();
    drop(bytes);
    assert_same(&table, &owned);

    Ok(())
}
