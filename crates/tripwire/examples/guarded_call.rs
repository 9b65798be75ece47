// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Guards a flaky operation with a breaker and watches it trip open and
//! recover.

use std::time::Duration;

use tripwire::{BoxError, Breaker, ConstantTimer, State};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let breaker: Breaker<u64> = Breaker::builder("flaky-service")
        .invocation_timeout(Duration::from_millis(200))
        .reset_timer(ConstantTimer::new(Duration::from_millis(500)))
        .opener(State::Closed, 80.0, 5)
        .closer(80.0, 5)
        .on_state_change(|from, to, stats| {
            println!("breaker moved {from} -> {to} (stats at trip: {stats:?})");
        })
        .build()
        .expect("breaker options are valid");

    // A burst of failures trips the breaker open.
    for attempt in 0..8_u64 {
        let outcome = breaker.run(|| async move { flaky(attempt).await }).await;
        println!("attempt {attempt}: {outcome:?} [state: {}]", breaker.state());
    }

    // Wait out the reset delay; the breaker probes recovery on its own.
    tokio::time::sleep(Duration::from_millis(600)).await;
    println!("after reset delay: {}", breaker.state());

    // Healthy calls in half-open close it again.
    for attempt in 100..106_u64 {
        let _ = breaker.run(|| async move { flaky(attempt).await }).await;
    }
    println!("after recovery: {}", breaker.state());
}

async fn flaky(attempt: u64) -> Result<u64, BoxError> {
    if attempt < 100 {
        Err(Box::new(std::io::Error::other("service unavailable")))
    } else {
        Ok(attempt)
    }
}
