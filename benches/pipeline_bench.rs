//! Benchmarks for the Tasklens query pipeline
//!
//! Run with: cargo bench

use chrono::{Days, NaiveDate};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use std::sync::Arc;
use tasklens::query::{compile, evaluate, lex, resolve_defaults, Compilation, EvalContext};
use tasklens::{Project, QueryEngine, RecordSource, SavedQueryStore, Task, TimeLog};

const PROJECTS: [&str; 4] = ["webapp", "ops", "home", "research"];

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 12).unwrap()
}

fn create_test_source(tasks: usize) -> RecordSource {
    let tasks_vec: Vec<Task> = (0..tasks)
        .map(|i| {
            let mut task = Task::new(i as u32, format!("task number {}", i), PROJECTS[i % 4])
                .priority((i % 3 + 1) as u8)
                .due(today() - Days::new(20) + Days::new((i % 40) as u64));
            if i % 5 == 0 {
                task = task.tag("blocked");
            }
            if i % 7 == 0 {
                task = task.done();
            }
            task
        })
        .collect();

    let logs: Vec<TimeLog> = (0..tasks * 2)
        .map(|i| {
            TimeLog::new(
                i as u32,
                PROJECTS[i % 4],
                today() - Days::new((i % 30) as u64),
                (i % 90 + 5) as u32,
            )
            .task((i / 2) as u32)
        })
        .collect();

    let projects = PROJECTS.iter().map(|p| Project::new(*p)).collect();
    RecordSource::new(tasks_vec, projects, logs)
}

fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile");
    let text = "tasks @webapp p<=2 due:+14 -#blocked \"task number\" cols:id,text,due,time_week sort:due+,priority- group:status";

    group.bench_function("lex", |b| b.iter(|| lex(black_box(text)).unwrap()));

    let tokens = lex(text).unwrap();
    group.bench_function("compile", |b| b.iter(|| compile(black_box(&tokens)).unwrap()));

    group.finish();
}

fn bench_evaluate(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluate");
    let ctx = EvalContext::new(today());

    let queries = [
        ("filter_sort", "tasks p<=2 due:+14 -#blocked"),
        ("task_metrics", "tasks cols:id,text,time_week,time_month,overdue_days sort:time_week-"),
        ("group", "tasks group:project sort:priority-"),
    ];

    for size in [100, 1000, 5000] {
        let source = create_test_source(size);
        group.throughput(Throughput::Elements(size as u64));

        for (name, text) in queries {
            let query = match compile(&lex(text).unwrap()).unwrap() {
                Compilation::Ready(query) => query,
                Compilation::Load { .. } => unreachable!(),
            };
            let directives = resolve_defaults(&query.filters, &query.directives);
            let query = tasklens::CompiledQuery { directives, ..query };

            group.bench_function(format!("{}_{}", name, size), |b| {
                b.iter(|| evaluate(black_box(&query), &source, &ctx).unwrap())
            });
        }
    }

    group.finish();
}

fn bench_engine(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine");
    let source = create_test_source(1000);
    let engine = QueryEngine::new(Arc::new(SavedQueryStore::in_memory().history_limit(0)));

    group.bench_function("projects_metrics_1000", |b| {
        b.iter(|| {
            engine
                .run(
                    black_box("projects metrics:task_count,overdue_task_count,time_week"),
                    &source,
                    today(),
                )
                .unwrap()
        })
    });

    group.finish();
}

criterion_group!(benches, bench_compile, bench_evaluate, bench_engine);
criterion_main!(benches);
