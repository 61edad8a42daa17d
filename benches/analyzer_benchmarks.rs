//! Performance benchmarks for the analyzers and the test runner
//!
//! Run with: cargo bench
//!
//! These benchmarks measure:
//! - Analyzer throughput on realistic learner submissions
//! - Test runner overhead per case
//! - Hint lookup cost

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use codegrade::hints::hints_for;
use codegrade::{
    analyze_script, audit_accessibility, run_tests, validate_markup, validate_style, TestResult,
};

const SCRIPT: &str = r#"
const API = "https://example.org/items";

async function loadItems(filter) {
  try {
    const response = await fetch(API);
    const items = await response.json();
    return items.filter(item => item.tags.includes(filter));
  } catch (error) {
    console.error(error);
    return [];
  }
}

function render(items) {
  let html = "";
  for (var i = 0; i < items.length; i++) {
    if (items[i].price == 0) {
      html += `<li>${items[i].name} (free)</li>`;
    } else {
      html += `<li>${items[i].name}: ${items[i].price}</li>`;
    }
  }
  return html;
}

module.exports = { loadItems, render };
"#;

const PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="utf-8"><title>Shop</title></head>
<body>
  <header><h1>Shop</h1><nav><a href="/">Home</a> <a href="/cart">Cart</a></nav></header>
  <main>
    <section>
      <h2>Items</h2>
      <ul><li><img src="a.png" alt="Mug"> Mug</li><li><img src="b.png"> Cup</li></ul>
      <form><label for="q">Search</label><input id="q" type="search"><button>Go</button></form>
      <table><caption>Prices</caption><tr><th>Item</th><th>Price</th></tr><tr><td>Mug</td><td>4</td></tr></table>
    </section>
  </main>
  <footer><p>Contact us</p></footer>
</body>
</html>
"#;

const STYLESHEET: &str = r#"
:root { --accent: #c33; }
body { margin: 0; font-family: sans-serif; }
header nav a { color: var(--accent); padding: 0.5rem; }
.card { display: grid; gap: 1rem; transition: transform 0.2s; }
.card:hover { transform: scale(1.02); }
#cart .total { font-weight: bold !important; }
"#;

const SUITE: &str = r#"
function slugify(text) { return text.trim().toLowerCase().split(/\s+/).join("-"); }
describe("slugify", () => {
  it("lowercases", () => expect(slugify("Hello")).toBe("hello"));
  it("joins words", () => expect(slugify(" a  b ")).toBe("a-b"));
  it("handles one word", () => expect(slugify("x")).toEqual("x"));
  it.each([["A B", "a-b"], ["C", "c"]])("maps %s", (input, out) => expect(slugify(input)).toBe(out));
});
"#;

/// Benchmark: each analyzer on a realistic submission
fn bench_analyzers(c: &mut Criterion) {
    let mut group = c.benchmark_group("analyzers");

    group.throughput(Throughput::Bytes(SCRIPT.len() as u64));
    group.bench_function("script", |b| b.iter(|| analyze_script(black_box(SCRIPT))));

    group.throughput(Throughput::Bytes(PAGE.len() as u64));
    group.bench_function("markup", |b| b.iter(|| validate_markup(black_box(PAGE))));
    group.bench_function("accessibility", |b| {
        b.iter(|| audit_accessibility(black_box(PAGE)))
    });

    group.throughput(Throughput::Bytes(STYLESHEET.len() as u64));
    group.bench_function("style", |b| b.iter(|| validate_style(black_box(STYLESHEET))));

    group.finish();
}

/// Benchmark: script analysis as submissions grow
fn bench_script_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("script_scaling");
    for copies in [1, 10, 50] {
        let source = SCRIPT.repeat(copies);
        group.throughput(Throughput::Bytes(source.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(copies), &source, |b, source| {
            b.iter(|| analyze_script(black_box(source)))
        });
    }
    group.finish();
}

/// Benchmark: a full registration + run of a small suite
fn bench_test_runner(c: &mut Criterion) {
    c.bench_function("run_tests", |b| b.iter(|| run_tests(black_box(SUITE))));
}

/// Benchmark: catalog lookup for a failing result
fn bench_hints(c: &mut Criterion) {
    let result = TestResult::fail("cart > total", "TypeError: items.reduce is not a function", 3);
    c.bench_function("hints_level_3", |b| b.iter(|| hints_for(black_box(&result), 3)));
}

criterion_group!(
    benches,
    bench_analyzers,
    bench_script_scaling,
    bench_test_runner,
    bench_hints
);
criterion_main!(benches);
