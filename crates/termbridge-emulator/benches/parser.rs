use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use termbridge_core::Dimensions;
use termbridge_emulator::{render_delta, AnsiParser, TerminalState};

/// Build a stream resembling a busy full-screen program.
fn busy_stream(rows: u16, cols: u16) -> Vec<u8> {
    let mut out = Vec::new();
    for frame in 0..20u16 {
        out.extend_from_slice(b"\x1b[H");
        for row in 0..rows {
            let color = 31 + (row + frame) % 7;
            out.extend_from_slice(format!("\x1b[{};1H\x1b[{}m", row + 1, color).as_bytes());
            let line: String = (0..cols)
                .map(|c| char::from(b'!' + ((row + c + frame) % 90) as u8))
                .collect();
            out.extend_from_slice(line.as_bytes());
            out.extend_from_slice(b"\x1b[0m");
        }
    }
    out
}

/// Plain scrolling log output.
fn log_stream(lines: usize) -> Vec<u8> {
    let mut out = Vec::new();
    for i in 0..lines {
        out.extend_from_slice(format!("[{i:06}] INFO request handled in 12ms\r\n").as_bytes());
    }
    out
}

fn bench_parse_and_apply(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_and_apply");

    for (rows, cols) in [(24u16, 80u16), (40, 120), (60, 160)] {
        let stream = busy_stream(rows, cols);
        group.throughput(Throughput::Bytes(stream.len() as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{rows}x{cols}")),
            &stream,
            |b, stream| {
                b.iter(|| {
                    let mut parser = AnsiParser::new();
                    let mut state = TerminalState::new(Dimensions::new(rows, cols));
                    state.apply_all(&parser.feed(black_box(stream)));
                    black_box(state.generation());
                });
            },
        );
    }

    group.finish();
}

fn bench_scrolling(c: &mut Criterion) {
    let stream = log_stream(2000);
    let mut group = c.benchmark_group("scrolling");
    group.throughput(Throughput::Bytes(stream.len() as u64));
    group.bench_function("log_2000_lines", |b| {
        b.iter(|| {
            let mut parser = AnsiParser::new();
            let mut state = TerminalState::new(Dimensions::new(24, 80));
            state.apply_all(&parser.feed(black_box(&stream)));
            black_box(state.cursor());
        });
    });
    group.finish();
}

fn bench_render_delta(c: &mut Criterion) {
    let stream = busy_stream(24, 80);
    let mut parser = AnsiParser::new();
    let mut state = TerminalState::new(Dimensions::new(24, 80));
    state.apply_all(&parser.feed(&stream));
    let dirty = state.take_dirty();

    c.bench_function("render_delta_full_screen", |b| {
        b.iter(|| black_box(render_delta(black_box(&state), black_box(&dirty))));
    });
}

criterion_group!(
    benches,
    bench_parse_and_apply,
    bench_scrolling,
    bench_render_delta
);
criterion_main!(benches);
