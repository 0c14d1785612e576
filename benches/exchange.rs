use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rdp::{
    rdp_parsing::{RdpHeaderBuilder, Segment},
    ChannelPair, Connection, Handler, MAX_PAYLOAD, MAX_SEGMENT_SIZE,
};

/// Keeps only the most recent segment, like a single datagram buffer.
struct LastSegment {
    buf: [u8; MAX_SEGMENT_SIZE],
    len: usize,
}

impl Handler for LastSegment {
    fn transmit(&mut self, _channels: ChannelPair, segment: &[u8]) {
        self.buf[..segment.len()].copy_from_slice(segment);
        self.len = segment.len();
    }
}

impl LastSegment {
    fn new() -> Self {
        Self {
            buf: [0; MAX_SEGMENT_SIZE],
            len: 0,
        }
    }
}

fn codec(c: &mut Criterion) {
    let payload = [0x5a; MAX_PAYLOAD];
    let mut out = [0; MAX_SEGMENT_SIZE];

    c.bench_function("build full segment", |b| {
        b.iter(|| {
            RdpHeaderBuilder::new(2, 1, black_box(1000))
                .ack(black_box(2000))
                .build(black_box(&payload), &mut out)
        })
    });

    let (_, len) = RdpHeaderBuilder::new(2, 1, 1000)
        .ack(2000)
        .build(&payload, &mut out)
        .unwrap();
    c.bench_function("parse full segment", |b| {
        b.iter(|| Segment::parse(black_box(&out[..len])))
    });
}

fn data_exchange(c: &mut Criterion) {
    let mut buffers = [[0; MAX_SEGMENT_SIZE]; 4];
    let [a_out, a_in, b_out, b_in] = &mut buffers;
    let mut a = Connection::new(a_out, a_in, LastSegment::new());
    let mut b = Connection::new(b_out, b_in, LastSegment::new());

    b.listen(1).unwrap();
    a.connect(1, 2).unwrap();
    let syn = a.handler().buf;
    b.received(&syn).unwrap();
    let syn_ack = b.handler().buf;
    a.received(&syn_ack).unwrap();
    let ack = a.handler().buf;
    b.received(&ack).unwrap();

    let payload = [0x5a; 64];
    c.bench_function("send, deliver and acknowledge", |bench| {
        bench.iter(|| {
            a.send(black_box(&payload)).unwrap();
            let data = a.handler().buf;
            b.received(&data[..a.handler().len]).unwrap();
            let ack = b.handler().buf;
            a.received(&ack[..b.handler().len]).unwrap();
        })
    });
}

criterion_group!(benches, codec, data_exchange);
criterion_main!(benches);
