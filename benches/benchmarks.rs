use std::hint::black_box;

use chrono::{TimeZone, Utc};
use criterion::{criterion_group, criterion_main, Criterion};
use static_mirror::payload::scan_stylesheet;
use static_mirror::url_resolver::{derive_filename, AssetNames};
use static_mirror::{GenerationStamp, PageRewriter};
use url::Url;

const PAGE: &str = r#"
<html>
    <head>
        <meta name="generator" content="WordPress 6.5">
        <link rel="stylesheet" href="/wp-content/themes/t/style.css?ver=6.5">
        <link rel="stylesheet" href="https://fonts.googleapis.com/css?family=Inter">
        <link rel="EditURI" href="/xmlrpc.php?rsd">
        <script src="/wp-includes/js/jquery.js?ver=3.7"></script>
        <style>.hero{background:url(/img/hero.jpg)}</style>
    </head>
    <body>
        <img src="/img/logo.png" srcset="/img/logo.png 1x, /img/logo@2x.png 2x" alt="Logo">
        <a href="/about/">About</a>
        <a href="/blog/post/?page=2#comments">Post</a>
        <a href="/files/report.pdf">Report</a>
        <a href="https://elsewhere.org/">Elsewhere</a>
    </body>
</html>
"#;

fn bench_page_rewrite(c: &mut Criterion) {
    let rewriter = PageRewriter::new(Url::parse("https://example.com/").unwrap());
    let stamp = GenerationStamp::new(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(), "1.0.0");

    c.bench_function("rewrite_page", |b| {
        b.iter(|| {
            let mut names = AssetNames::new();
            rewriter.rewrite(black_box(PAGE), black_box("/blog/post/"), &stamp, &mut names)
        });
    });
}

fn bench_derive_filename(c: &mut Criterion) {
    let urls = [
        "https://example.com/wp-content/themes/t/style.css?ver=6.5",
        "https://example.com/img/photo%20one.JPG",
        "https://example.com/img/..%2F..%2Fetc%2Fpasswd.png",
        "https://example.com/fonts/inter.woff2#iefix",
        "https://example.com/download.php?id=7",
    ];

    c.bench_function("derive_filename", |b| {
        b.iter(|| {
            for url in &urls {
                black_box(derive_filename(black_box(url)));
            }
        });
    });
}

fn bench_stylesheet_scan(c: &mut Criterion) {
    let css = r#"
        @import url("reset.css");
        @import "print.css" print;
        body { background: url(../img/bg.png) no-repeat; }
        @font-face { src: url('../fonts/inter.woff2') format('woff2'), url(data:font/woff;base64,AAAA); }
    "#
    .repeat(20);

    c.bench_function("scan_stylesheet", |b| {
        b.iter(|| scan_stylesheet(black_box(&css)));
    });
}

criterion_group!(
    benches,
    bench_page_rewrite,
    bench_derive_filename,
    bench_stylesheet_scan
);
criterion_main!(benches);
