//! Three fibers taking turns on one thread.
//!
//! Run with `RUST_LOG=trace` to watch the dispatcher's bookkeeping.

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    weft::initialize();

    weft::spawn(|| {
        for i in 1..=5 {
            println!("greeter: hello {i}");
            weft::yield_now();
        }
    })
    .unwrap();

    weft::spawn(|| {
        let (mut current, mut next) = (0u64, 1u64);
        for _ in 0..5 {
            println!("fibonacci: {current}");
            (current, next) = (next, current + next);
            weft::yield_now();
        }
    })
    .unwrap();

    weft::spawn(|| {
        for i in 1u64..=5 {
            println!("squares: {}", i * i);
            weft::yield_now();
        }
    })
    .unwrap();

    println!("spawned, nothing has run yet");
    weft::join_all();
    println!("all tasks finished");
}
