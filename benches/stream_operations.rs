use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pullstream::prelude::*;
use std::cell::Cell;
use std::rc::Rc;

fn bench_functor_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("functor");

    for size in [1_000, 10_000, 100_000].iter() {
        group.bench_with_input(BenchmarkId::new("map_filter", size), size, |b, &size| {
            b.iter(|| {
                let result = Functor::from_iterable(0..size)
                    .map(|x| black_box(x * 2))
                    .filter(|x| black_box(x % 4 == 0))
                    .to_vec();
                black_box(result)
            });
        });

        group.bench_with_input(BenchmarkId::new("chunk_flat", size), size, |b, &size| {
            b.iter(|| {
                let result = Functor::from_iterable(0..size)
                    .chunk(16)
                    .flat()
                    .fold(0u64, |acc, x| acc + x as u64);
                black_box(result)
            });
        });
    }

    group.finish();
}

fn bench_stream_push_each(c: &mut Criterion) {
    let mut group = c.benchmark_group("stream");

    for size in [1_000, 10_000, 100_000].iter() {
        group.bench_with_input(BenchmarkId::new("push_each", size), size, |b, &size| {
            b.iter(|| {
                let stream = Stream::pushable();
                let total = Rc::new(Cell::new(0u64));
                let sink = total.clone();
                stream
                    .clone()
                    .map(|x: u64| x + 1)
                    .each(move |x| sink.set(sink.get() + x));
                for n in 0..size {
                    stream.push(n).unwrap();
                }
                stream.stop().unwrap();
                black_box(total.get())
            });
        });

        group.bench_with_input(BenchmarkId::new("merge", size), size, |b, &size| {
            b.iter(|| {
                let left = Stream::pushable();
                let right = Stream::pushable();
                let merged = merge(vec![left.clone(), right.clone()]);
                let count = Rc::new(Cell::new(0usize));
                let counter = count.clone();
                merged.each(move |_| counter.set(counter.get() + 1));
                for n in 0..size {
                    if n % 2 == 0 {
                        left.push(n).unwrap();
                    } else {
                        right.push(n).unwrap();
                    }
                }
                black_box(count.get())
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_functor_pipeline, bench_stream_push_each);
criterion_main!(benches);
