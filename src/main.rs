// src/main.rs
// Demo: run a small simulated network of distance-vector routers, break a
// link, and print how the forwarding tables converge.

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use dv_router::sim::{Network, SimConfig};
use dv_router::{RouterConfig, SimError};

#[derive(Parser, Debug)]
#[command(name = "dv_router", about = "Distance-vector routing simulation")]
struct Args {
    /// Use poison reverse instead of plain split horizon.
    #[arg(long)]
    poison: bool,

    /// Timer ticks to run before and after the link failure.
    #[arg(long, default_value_t = 6)]
    ticks: usize,

    /// Time units between timer ticks.
    #[arg(long, default_value_t = 5)]
    timer_interval: u64,

    /// Probability of losing a route advertisement.
    #[arg(long, default_value_t = 0.0)]
    loss: f64,

    #[arg(long, default_value_t = 0)]
    seed: u64,
}

fn main() -> Result<(), SimError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();
    let mut net = Network::new(
        SimConfig::new()
            .timer_interval(args.timer_interval)
            .loss(args.loss)
            .seed(args.seed),
    );
    let rc = RouterConfig::new().poison_mode(args.poison);

    //   h1 - r1 --1-- r2 --1-- r3 - h2
    //         \              /
    //          `-----5------'   r4 - h3 hangs off r3
    for r in ["r1", "r2", "r3", "r4"] {
        net.add_router(r, rc)?;
    }
    for h in ["h1", "h2", "h3"] {
        net.add_host(h)?;
    }
    net.link("h1", "r1", 1)?;
    net.link("h2", "r3", 1)?;
    net.link("h3", "r4", 1)?;
    net.link("r1", "r2", 1)?;
    net.link("r2", "r3", 1)?;
    net.link("r1", "r3", 5)?;
    net.link("r3", "r4", 2)?;

    net.run_ticks(args.ticks)?;
    print_tables(&net, "converged");
    info!(delivered = net.send_data("h1", "h3", b"hello")?, "h1 -> h3");

    net.unlink("r2", "r3")?;
    info!("r2 - r3 link failed");
    net.run_ticks(args.ticks)?;
    print_tables(&net, "after r2 - r3 failure");
    info!(delivered = net.send_data("h1", "h3", b"hello again")?, "h1 -> h3");

    let stats = net.stats();
    info!(
        delivered = stats.delivered,
        lost = stats.lost,
        dead_link = stats.dead_link,
        "done at t={}",
        net.now()
    );
    Ok(())
}

fn print_tables(net: &Network, label: &str) {
    println!("== t={} {}", net.now(), label);
    for name in net.routers() {
        let Some(router) = net.router(&name) else {
            continue;
        };
        println!("[{name}]");
        for e in router.forwarding_table().all() {
            println!("  {}", e.summary());
        }
    }
}
