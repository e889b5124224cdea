use criterion::{black_box, criterion_group, criterion_main, Criterion};
use securecode::budget::{budget_chat, budget_rules, split, DEFAULT_CHUNK_TOKENS, DEFAULT_CONTEXT_TOKENS};

fn synthetic_source(line_count: usize) -> String {
    let mut out = String::with_capacity(line_count * 48);
    for i in 0..line_count {
        match i % 4 {
            0 => out.push_str(&format!("def handler_{i}(request):\n")),
            1 => out.push_str("    query = \"SELECT * FROM users WHERE id = \" + request.args['id']\n"),
            2 => out.push_str("    return db.execute(query)  # naïve ☃\n"),
            _ => out.push('\n'),
        }
    }
    out
}

fn bench_split(c: &mut Criterion) {
    let small = synthetic_source(200);
    let large = synthetic_source(20_000);

    c.bench_function("split_whole", |b| {
        b.iter(|| black_box(split(black_box(&small), DEFAULT_CHUNK_TOKENS)))
    });

    c.bench_function("split_chunked_20k_lines", |b| {
        b.iter(|| black_box(split(black_box(&large), DEFAULT_CHUNK_TOKENS)))
    });
}

fn bench_budget_pair(c: &mut Criterion) {
    let code = synthetic_source(5_000);
    let analysis = synthetic_source(500);

    c.bench_function("budget_chat_truncating", |b| {
        b.iter(|| black_box(budget_chat(black_box(&code), black_box(&analysis), DEFAULT_CONTEXT_TOKENS)))
    });

    c.bench_function("budget_rules_truncating", |b| {
        b.iter(|| black_box(budget_rules(black_box(&code), black_box(&analysis), DEFAULT_CONTEXT_TOKENS)))
    });
}

criterion_group!(perf_core, bench_split, bench_budget_pair);
criterion_main!(perf_core);
