use divan::Bencher;
use xml_to_csv::extractor::{decode_document, extract_from_str};
use xml_to_csv::{FieldCatalog, TableWriter};

fn main() {
    divan::main();
}

fn declaration(items: usize) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<ESADout_CU xmlns:cat="urn:customs.ru:CUESADCommonAggregateTypesCust:5.14.3">
"#,
    );
    for i in 0..items {
        xml.push_str(&format!(
            "<ESADout_CUGoods>
    <cat:GoodsNumeric>{i}</cat:GoodsNumeric>
    <cat:GoodsDescription>Болт М8 оцинкованный</cat:GoodsDescription>
    <cat:GrossWeightQuantity>12.5</cat:GrossWeightQuantity>
    <cat:InvoicedCost>1040.00</cat:InvoicedCost>
    <cat:ContractCurrencyCode>USD</cat:ContractCurrencyCode>
    <cat:GoodsTNVEDCode><cat:Code>7318158109</cat:Code></cat:GoodsTNVEDCode>
</ESADout_CUGoods>
"
        ));
    }
    xml.push_str("</ESADout_CU>\n");
    xml
}

#[divan::bench(args = [1, 100, 1000])]
fn extract_records(bencher: Bencher, items: usize) {
    let catalog = FieldCatalog::builtin();
    let xml = declaration(items);

    bencher.bench_local(move || extract_from_str(&xml, &catalog).expect("Failed to parse"));
}

#[divan::bench]
fn decode_windows_1251(bencher: Bencher) {
    let text = declaration(100).replace("UTF-8", "windows-1251");
    let (bytes, _, _) = encoding_rs::WINDOWS_1251.encode(&text);
    let bytes = bytes.into_owned();

    bencher.bench_local(move || decode_document(&bytes).len());
}

#[divan::bench(args = [100, 1000])]
fn write_table(bencher: Bencher, items: usize) {
    let catalog = FieldCatalog::builtin();
    let records = extract_from_str(&declaration(items), &catalog).unwrap();
    let writer = TableWriter::default();

    bencher.bench_local(move || {
        let mut sink = Vec::new();
        writer
            .write_to(&records, &catalog, &mut sink)
            .expect("Failed to write table");
        sink.len()
    });
}
