use cascara_core::{NoopBroadcaster, Tree};
use cascara_parser::parse;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn parse_small_sheet(c: &mut Criterion) {
    let source = r#"
        .button {
            padding: 8px 16px;
            background: #3366ff;
            border-radius: 4px;
        }

        .button:hover {
            background: #2255ee;
        }
    "#;

    c.bench_function("parse_small_sheet", |b| {
        b.iter(|| {
            let mut tree = Tree::new();
            parse(black_box(source), &mut tree, &mut NoopBroadcaster).unwrap()
        })
    });
}

fn parse_medium_sheet(c: &mut Criterion) {
    let mut source = String::from("@charset \"UTF-8\";\n");
    for i in 0..200 {
        source.push_str(&format!(
            ".card-{i} > .title, .card-{i} .body {{\n  margin: {i}px 0;\n  color: #333;\n  font: 12px/1.4 sans-serif;\n}}\n"
        ));
    }
    source.push_str("@media screen and (max-width: 600px) { .card-0 { display: none } }\n");

    c.bench_function("parse_medium_sheet", |b| {
        b.iter(|| {
            let mut tree = Tree::new();
            parse(black_box(&source), &mut tree, &mut NoopBroadcaster).unwrap()
        })
    });
}

criterion_group!(benches, parse_small_sheet, parse_medium_sheet);
criterion_main!(benches);
