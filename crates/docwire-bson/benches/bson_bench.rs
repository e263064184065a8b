use criterion::{criterion_group, criterion_main, Criterion};
use docwire_bson::{
    decode, decode_reader, doc, encode, encode_to_sink, sizes_of, Document, ReadOptions,
    WriteOptions,
};
use std::hint::black_box;
use std::io::Cursor;

fn sample_document() -> Document {
    doc! {
        "name": "docwire",
        "age": (16i64),
        "active": true,
        "score": 99.5,
        "address": { "street": "123 Main St", "city": "Tokyo" },
        "tags": ["codec", "stream", "bson"],
        "history": [{ "v": 1 }, { "v": 2 }, { "v": 3 }]
    }
}

fn bench_sizes_of(c: &mut Criterion) {
    let doc = sample_document();
    c.bench_function("sizes_of", |b| b.iter(|| sizes_of(black_box(&doc))));
}

fn bench_encode_patch(c: &mut Criterion) {
    let doc = sample_document();
    let options = WriteOptions::default();
    c.bench_function("encode_patch", |b| b.iter(|| encode(black_box(&doc), &options)));
}

fn bench_encode_sized(c: &mut Criterion) {
    let doc = sample_document();
    let options = WriteOptions::default();
    let mut out = Vec::with_capacity(512);
    c.bench_function("encode_sized", |b| {
        b.iter(|| {
            out.clear();
            encode_to_sink(black_box(&doc), &mut out, &options)
        })
    });
}

fn bench_encode_skip_sizes(c: &mut Criterion) {
    let doc = sample_document();
    let options = WriteOptions { skip_sizes: true };
    c.bench_function("encode_skip_sizes", |b| b.iter(|| encode(black_box(&doc), &options)));
}

fn bench_decode_buffer(c: &mut Criterion) {
    let encoded = encode(&sample_document(), &WriteOptions::default()).unwrap();
    let options = ReadOptions::default();
    c.bench_function("decode_buffer", |b| b.iter(|| decode(black_box(&encoded), &options)));
}

fn bench_decode_reader(c: &mut Criterion) {
    let encoded = encode(&sample_document(), &WriteOptions::default()).unwrap();
    let options = ReadOptions::default();
    c.bench_function("decode_reader", |b| {
        b.iter(|| decode_reader(Cursor::new(black_box(encoded.as_slice())), &options))
    });
}

criterion_group!(
    benches,
    bench_sizes_of,
    bench_encode_patch,
    bench_encode_sized,
    bench_encode_skip_sizes,
    bench_decode_buffer,
    bench_decode_reader,
);

criterion_main!(benches);
