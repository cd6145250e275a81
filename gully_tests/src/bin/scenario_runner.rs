//! End-to-end scenario runner.
//!
//! Drives real clients over TCP through the full gameplay loop: join,
//! walk, shop, drive, work. Each scenario spins up its own in-process
//! server unless `--addr <host:port>` points at a running one; targeted
//! servers are assumed to be dedicated, otherwise roster and balance
//! checks will not hold. Exits nonzero if any scenario fails.
//!
//! Usage:
//!   cargo run -p gully_tests --bin scenario_runner -- [--addr 127.0.0.1:43210]

use std::time::{Duration, Instant};

use anyhow::Context;
use gully_client::GameClient;
use gully_server::server::bind_ephemeral;
use gully_shared::config::WorldConfig;
use gully_shared::economy::{JOB_DURATION, JOB_REWARD, STARTING_BALANCE};
use gully_shared::entity::VehicleId;
use gully_shared::math::Vec2;

struct Stats {
    passed: u32,
    failed: u32,
}

fn parse_args() -> Option<String> {
    let args: Vec<String> = std::env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--addr" if i + 1 < args.len() => return Some(args[i + 1].clone()),
            _ => i += 1,
        }
    }
    None
}

async fn target_config(addr: &Option<String>) -> anyhow::Result<WorldConfig> {
    match addr {
        Some(addr) => Ok(WorldConfig {
            server_addr: addr.clone(),
            ..Default::default()
        }),
        None => {
            let (server, cfg) = bind_ephemeral().await?;
            tokio::spawn(server.run());
            Ok(cfg)
        }
    }
}

async fn join_client(cfg: &WorldConfig, name: &str) -> anyhow::Result<GameClient> {
    let mut client = GameClient::connect(cfg).await?;
    client.join(name).await?;
    Ok(client)
}

async fn settle(client: &mut GameClient) -> anyhow::Result<()> {
    tokio::time::sleep(Duration::from_millis(100)).await;
    client.poll_events().await
}

async fn check(
    name: &str,
    fut: impl std::future::Future<Output = anyhow::Result<()>>,
    stats: &mut Stats,
) {
    let start = Instant::now();
    match fut.await {
        Ok(()) => {
            println!("  PASS {name} ({} ms)", start.elapsed().as_millis());
            stats.passed += 1;
        }
        Err(e) => {
            println!("  FAIL {name}: {e:#}");
            stats.failed += 1;
        }
    }
}

/// Two clients join and each sees the full roster plus the world vehicles.
async fn roster_fan_out(cfg: WorldConfig) -> anyhow::Result<()> {
    let mut ada = join_client(&cfg, "Ada").await?;
    settle(&mut ada).await?;
    let mut brin = join_client(&cfg, "Brin").await?;
    settle(&mut brin).await?;
    settle(&mut ada).await?;

    for client in [&ada, &brin] {
        let names: Vec<&str> = client.view.players().iter().map(|p| p.name.as_str()).collect();
        anyhow::ensure!(names == ["Ada", "Brin"], "roster {names:?}");
    }
    anyhow::ensure!(!brin.view.vehicles().is_empty(), "no vehicles in snapshot");
    Ok(())
}

/// A teleport-sized move is clamped before it reaches spectators.
async fn movement_clamp(cfg: WorldConfig) -> anyhow::Result<()> {
    let mut ada = join_client(&cfg, "Ada").await?;
    settle(&mut ada).await?;
    let mut brin = join_client(&cfg, "Brin").await?;
    settle(&mut brin).await?;

    let spawn = brin.view.player(ada.player_id).context("ada in view")?.pos;
    ada.send_move(spawn.x + 1000.0, spawn.z).await?;
    settle(&mut brin).await?;

    let seen = brin.view.player(ada.player_id).context("ada in view")?.pos;
    anyhow::ensure!(spawn.dist(seen) > 0.0, "move never broadcast");
    anyhow::ensure!(spawn.dist(seen) < 100.0, "teleport accepted, moved {}", spawn.dist(seen));
    Ok(())
}

/// The catalog arrives on request and purchases debit the balance until
/// the server refuses with an error event.
async fn shopping_until_broke(cfg: WorldConfig) -> anyhow::Result<()> {
    let mut ada = join_client(&cfg, "Ada").await?;
    settle(&mut ada).await?;

    ada.open_shop().await?;
    settle(&mut ada).await?;
    let notices = ada.view.drain_notices();
    anyhow::ensure!(
        notices.iter().any(|n| n.contains("shirt-red")),
        "catalog missing: {notices:?}"
    );

    ada.buy_item("shirt-red").await?;
    ada.buy_item("pants-blue").await?;
    settle(&mut ada).await?;
    let money = ada.view.own_player().context("own")?.money;
    anyhow::ensure!(money == 10, "balance {money}, wanted 10");

    ada.buy_item("pants-blue").await?;
    settle(&mut ada).await?;
    let notices = ada.view.drain_notices();
    anyhow::ensure!(
        notices.iter().any(|n| n == "Server error: insufficient"),
        "no refusal: {notices:?}"
    );
    Ok(())
}

/// Enter, get refused as second driver, drive, exit.
async fn vehicle_cycle(cfg: WorldConfig) -> anyhow::Result<()> {
    let rick = VehicleId::new("rick1");
    let mut ada = join_client(&cfg, "Ada").await?;
    settle(&mut ada).await?;
    let mut brin = join_client(&cfg, "Brin").await?;
    settle(&mut brin).await?;

    ada.enter_vehicle(rick.clone()).await?;
    settle(&mut ada).await?;
    settle(&mut brin).await?;
    anyhow::ensure!(
        brin.view.vehicle(&rick).context("rick")?.owner_id == Some(ada.player_id),
        "ownership not broadcast"
    );

    brin.enter_vehicle(rick.clone()).await?;
    settle(&mut brin).await?;
    let notices = brin.view.drain_notices();
    anyhow::ensure!(
        notices.iter().any(|n| n == "Server error: vehicle occupied"),
        "no refusal: {notices:?}"
    );

    ada.drive_vehicle(rick.clone(), 20.0, 5.0, 1.0).await?;
    settle(&mut brin).await?;
    let seen = brin.view.vehicle(&rick).context("rick")?.pos;
    anyhow::ensure!(seen == Vec2::new(20.0, 5.0), "drive not broadcast, saw {seen:?}");

    ada.exit_vehicle(rick.clone()).await?;
    settle(&mut ada).await?;
    settle(&mut brin).await?;
    anyhow::ensure!(brin.view.vehicle(&rick).context("rick")?.is_free(), "seat not freed");
    anyhow::ensure!(
        ada.view.own_player().context("own")?.in_vehicle_id.is_none(),
        "driver still seated"
    );
    Ok(())
}

/// A delivery job pays out after its real duration.
async fn delivery_payout(cfg: WorldConfig) -> anyhow::Result<()> {
    let mut ada = join_client(&cfg, "Ada").await?;
    settle(&mut ada).await?;

    ada.start_job("delivery").await?;
    println!("  ... waiting {}s for the delivery payout", JOB_DURATION.as_secs());
    tokio::time::sleep(JOB_DURATION + Duration::from_secs(1)).await;
    settle(&mut ada).await?;

    let money = ada.view.own_player().context("own")?.money;
    anyhow::ensure!(
        money == STARTING_BALANCE + JOB_REWARD,
        "balance {money}, wanted {}",
        STARTING_BALANCE + JOB_REWARD
    );
    let notices = ada.view.drain_notices();
    anyhow::ensure!(
        notices.iter().any(|n| n.contains("Job finished")),
        "no payout notice: {notices:?}"
    );
    Ok(())
}

/// Five clients join and wander; every replica converges, and the roster
/// shrinks as they leave.
async fn swarm(cfg: WorldConfig) -> anyhow::Result<()> {
    let mut bots = Vec::new();
    for i in 0..5 {
        let mut bot = join_client(&cfg, &format!("bot-{i}")).await?;
        bot.send_move(i as f32, -(i as f32)).await?;
        bots.push(bot);
    }
    tokio::time::sleep(Duration::from_millis(300)).await;
    for bot in &mut bots {
        bot.poll_events().await?;
        let seen = bot.view.players().len();
        anyhow::ensure!(seen == 5, "replica has {seen} players");
    }

    let mut last = bots.pop().context("bots")?;
    drop(bots);
    tokio::time::sleep(Duration::from_millis(300)).await;
    last.poll_events().await?;
    let seen = last.view.players().len();
    anyhow::ensure!(seen == 1, "roster still has {seen} players");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let addr = parse_args();

    println!("Gully scenario runner");
    println!("=====================");
    match &addr {
        Some(a) => println!("Target: {a}"),
        None => println!("Target: in-process server per scenario"),
    }
    println!();

    let mut stats = Stats {
        passed: 0,
        failed: 0,
    };

    check("roster fan-out", roster_fan_out(target_config(&addr).await?), &mut stats).await;
    check("movement clamp", movement_clamp(target_config(&addr).await?), &mut stats).await;
    check(
        "shopping until broke",
        shopping_until_broke(target_config(&addr).await?),
        &mut stats,
    )
    .await;
    check("vehicle cycle", vehicle_cycle(target_config(&addr).await?), &mut stats).await;
    check(
        "delivery payout",
        delivery_payout(target_config(&addr).await?),
        &mut stats,
    )
    .await;
    check("swarm", swarm(target_config(&addr).await?), &mut stats).await;

    println!();
    println!("=====================");
    println!("Passed: {}", stats.passed);
    println!("Failed: {}", stats.failed);

    if stats.failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}
