use council_stream::TrailingFramePolicy;
use council_stream::models::{MessageRequest, ResponseMode};
use council_stream::streaming::{FrameAssembler, Utf8Decoder, decode_frame};
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;

fn sample_wire() -> String {
    let mut wire = String::from("data: {\"type\":\"stage1_start\"}\n\n");
    for i in 0..200 {
        wire.push_str(&format!(
            "data: {{\"type\":\"stage1_token\",\"model\":\"model-{}\",\"content\":\"token {} – ünïcödé €\"}}\n\n",
            i % 5,
            i
        ));
    }
    wire.push_str(
        "data: {\"type\":\"stage3_complete\",\"data\":{\"model\":\"chair\",\"response\":\"Final answer\"}}\n\n",
    );
    wire.push_str("data: {\"type\":\"complete\"}\n\n");
    wire
}

fn run_pipeline(chunks: &[&[u8]]) -> usize {
    let mut decoder = Utf8Decoder::new();
    let mut assembler = FrameAssembler::new(TrailingFramePolicy::Flush, 1 << 20);
    let mut events = 0;

    for chunk in chunks {
        let text = decoder.decode(chunk);
        assembler.push(&text).unwrap();
        while let Some(frame) = assembler.next_frame() {
            events += decode_frame(&frame).events.len();
        }
    }
    events
}

fn benchmark_frame_decoding(c: &mut Criterion) {
    let frame = r#"data: {"type":"stage2_complete","data":[{"model":"a","ranking":"1. Response B","parsed_ranking":["Response B"]}],"metadata":{"label_to_model":{"Response B":"b"},"aggregate_rankings":[{"model":"b","average_rank":1.0,"rankings_count":1}]}}"#;

    c.bench_function("decode_frame", |b| {
        b.iter(|| {
            black_box(decode_frame(black_box(frame)));
        });
    });
}

fn benchmark_pipeline(c: &mut Criterion) {
    let wire = sample_wire();
    let bytes = wire.as_bytes();

    let mut group = c.benchmark_group("stream_pipeline");
    group.throughput(Throughput::Bytes(bytes.len() as u64));

    group.bench_function("single_chunk", |b| {
        b.iter(|| black_box(run_pipeline(&[bytes])));
    });

    for size in [16usize, 256, 4096] {
        let chunks: Vec<&[u8]> = bytes.chunks(size).collect();
        group.bench_function(format!("chunks_of_{}", size), |b| {
            b.iter(|| black_box(run_pipeline(&chunks)));
        });
    }

    group.finish();
}

fn benchmark_utf8_decoder(c: &mut Criterion) {
    let text = "Zürich – 東京 – 🦀 ".repeat(256);
    let bytes = text.as_bytes();

    let mut group = c.benchmark_group("utf8_decoder");
    group.throughput(Throughput::Bytes(bytes.len() as u64));

    group.bench_function("byte_by_byte", |b| {
        b.iter(|| {
            let mut decoder = Utf8Decoder::new();
            for byte in bytes {
                black_box(decoder.decode(std::slice::from_ref(byte)));
            }
        });
    });

    group.finish();
}

fn benchmark_request_serialization(c: &mut Criterion) {
    let req = MessageRequest::new("Should we open a second warehouse in Lyon?")
        .with_attachments(vec!["att_1".to_string(), "att_2".to_string()])
        .with_response_mode(ResponseMode::Detailed);

    c.bench_function("serialize_message_request", |b| {
        b.iter(|| {
            black_box(serde_json::to_vec(&req).unwrap());
        });
    });
}

criterion_group!(
    benches,
    benchmark_frame_decoding,
    benchmark_pipeline,
    benchmark_utf8_decoder,
    benchmark_request_serialization
);
criterion_main!(benches);
