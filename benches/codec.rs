//! Benchmarks for the EPUB reader and writer.
//!
//! Run with: cargo bench

use std::io::{Cursor, Write};

use criterion::{Criterion, criterion_group, criterion_main};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use quire::{
    Author, Book, MediaType, Resource, Version, read_epub_from_reader, write_epub_to_writer,
};

const CHAPTERS: usize = 50;

fn chapter(n: usize) -> Vec<u8> {
    let mut body = String::new();
    for p in 0..40 {
        body.push_str(&format!(
            "<p id=\"p{p}\">Paragraph {p} of chapter {n}. <a href=\"ch{}.xhtml#p0\">next</a></p>\n",
            n + 1
        ));
    }
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<html xmlns=\"http://www.w3.org/1999/xhtml\"><head><title>{n}</title><link rel=\"stylesheet\" href=\"../style.css\"/></head><body>{body}</body></html>"
    )
    .into_bytes()
}

fn sample_book(version: Version) -> Book {
    let mut book = Book::new(version);
    book.metadata.add_title("Benchmark");
    book.metadata.add_creator(Author::new("Criterion"));
    book.metadata.languages.push("en".into());
    book.add_resource(Resource::new(
        "css",
        "style.css",
        MediaType::CSS,
        b"p { margin: 0 }".to_vec(),
    ));
    for n in 0..CHAPTERS {
        let resource = Resource::new("", format!("text/ch{n}.xhtml"), MediaType::XHTML, chapter(n));
        book.add_section(&format!("Chapter {n}"), resource)
            .expect("chapter registers");
    }
    book
}

fn sample_bytes(version: Version) -> Vec<u8> {
    let mut book = sample_book(version);
    write_epub_to_writer(&mut book, Cursor::new(Vec::new()))
        .unwrap()
        .into_inner()
}

fn bench_read(c: &mut Criterion) {
    let epub2 = sample_bytes(Version::Epub2);
    let epub3 = sample_bytes(Version::Epub3);

    c.bench_function("read_epub2", |b| {
        b.iter(|| read_epub_from_reader(Cursor::new(epub2.as_slice())).unwrap());
    });
    c.bench_function("read_epub3", |b| {
        b.iter(|| read_epub_from_reader(Cursor::new(epub3.as_slice())).unwrap());
    });
}

fn bench_write(c: &mut Criterion) {
    let book = sample_book(Version::Epub3);
    c.bench_function("write_epub3", |b| {
        b.iter(|| {
            let mut book = book.clone();
            write_epub_to_writer(&mut book, Cursor::new(Vec::new())).unwrap()
        });
    });
}

fn bench_rename(c: &mut Criterion) {
    let book = sample_book(Version::Epub3);
    c.bench_function("rename_resource", |b| {
        b.iter(|| {
            let mut book = book.clone();
            book.rename_resource("text/ch1.xhtml", "text/renamed.xhtml").unwrap();
            book
        });
    });
}

fn bench_zip_baseline(c: &mut Criterion) {
    let data: Vec<Vec<u8>> = (0..CHAPTERS).map(chapter).collect();
    c.bench_function("zip_baseline", |b| {
        b.iter(|| {
            let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
            for (n, bytes) in data.iter().enumerate() {
                zip.start_file(format!("ch{n}.xhtml"), SimpleFileOptions::default())
                    .unwrap();
                zip.write_all(bytes).unwrap();
            }
            zip.finish().unwrap()
        });
    });
}

criterion_group!(benches, bench_read, bench_write, bench_rename, bench_zip_baseline);
criterion_main!(benches);
