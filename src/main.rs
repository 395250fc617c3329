use std::sync::Arc;
use std::time::Duration;

use actix_web::{get, middleware, web::Data, App, HttpRequest, HttpResponse, HttpServer, Responder};
use agent_reconciler::backend::{Backend, NoopObjectStore, UnimplementedBackend};
use agent_reconciler::config::GcConfig;
use agent_reconciler::gc::GarbageCollector;
use agent_reconciler::leader::{run_periodic, LeaseLeaderElector, SharedLeaderElector, StaticLeaderElector};
use agent_reconciler::metrics::Metrics;
use agent_reconciler::reconciler::{self, State};
use agent_reconciler::telemetry;
use agent_reconciler::types::Agent;
use clap::{Args, Parser, Subcommand};
use kube::{Client, CustomResourceExt};
use prometheus::{Encoder, TextEncoder};

/// Tick period for both garbage-collector sweeps; each runs on its own
/// independent ticker since only one of the two is leader-gated (§4.E/§4.F).
const GC_SWEEP_PERIOD: Duration = Duration::from_secs(60);

/// Leader-election lease renewal period, well under the Lease's own
/// `leaseDurationSeconds` so a live holder never lapses (§4.F).
const LEASE_REFRESH_PERIOD: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(about = "Reconciles Agent custom resources against backend host state")]
struct Opts {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the Agent CustomResourceDefinition YAML and exit.
    Crd,
    /// Run the reconciler, garbage collector, and metrics/health server.
    Run(RunArgs),
}

#[derive(Args)]
struct RunArgs {
    #[command(flatten)]
    gc: GcConfig,

    /// Namespace holding the leader-election Lease.
    #[arg(long, env = "LEADER_ELECTION_NAMESPACE", default_value = "default")]
    leader_election_namespace: String,

    /// Name of the leader-election Lease.
    #[arg(long, env = "LEADER_ELECTION_LEASE_NAME", default_value = "agent-reconciler-leader")]
    leader_election_lease_name: String,

    /// Disable Lease-backed leader election and always act as leader; for
    /// single-replica deployments and local runs.
    #[arg(long, env = "DISABLE_LEADER_ELECTION")]
    disable_leader_election: bool,

    /// Address the metrics/health HTTP server binds to.
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8080")]
    bind_addr: String,
}

#[get("/metrics")]
async fn metrics(c: Data<State>, _req: HttpRequest) -> impl Responder {
    let metrics = c.metrics();
    let encoder = TextEncoder::new();
    let mut buffer = vec![];
    encoder.encode(&metrics, &mut buffer).unwrap();
    HttpResponse::Ok().body(buffer)
}

#[get("/health")]
async fn health(_: HttpRequest) -> impl Responder {
    HttpResponse::Ok().json("healthy")
}

#[get("/")]
async fn index(c: Data<State>, _req: HttpRequest) -> impl Responder {
    let d = c.diagnostics().await;
    HttpResponse::Ok().json(&d)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let opts = Opts::parse();

    match opts.cmd {
        Command::Crd => {
            print!("{}", serde_yaml::to_string(&Agent::crd())?);
        }
        Command::Run(args) => run(args).await?,
    }

    Ok(())
}

async fn run(args: RunArgs) -> anyhow::Result<()> {
    telemetry::init();

    let client = Client::try_default().await?;
    let backend: Arc<dyn Backend> = Arc::new(UnimplementedBackend);

    let (leader, lease_refresh): (SharedLeaderElector, Option<Arc<LeaseLeaderElector>>) =
        if args.disable_leader_election {
            (Arc::new(StaticLeaderElector(true)), None)
        } else {
            let lease = Arc::new(LeaseLeaderElector::new(
                client.clone(),
                args.leader_election_namespace,
                args.leader_election_lease_name,
                uuid::Uuid::new_v4().to_string(),
            ));
            (lease.clone(), Some(lease))
        };

    let state = State::default();
    let controller = reconciler::run(state.clone(), backend.clone());

    let gc = Arc::new(GarbageCollector::new(
        backend,
        leader,
        args.gc,
        Arc::new(NoopObjectStore),
        Arc::new(Metrics::default()),
    ));
    // Background sweeps have no natural end; they are spawned rather than
    // joined so a shutdown signal (handled by the controller below) isn't
    // blocked waiting on them. Each sweep gets its own ticker: the
    // deregister sweep is not leader-gated and must keep running on every
    // replica, while the permanent-delete sweep no-ops off the leader.
    let deregister_gc = gc.clone();
    tokio::spawn(run_periodic(GC_SWEEP_PERIOD, move || {
        let gc = deregister_gc.clone();
        async move { gc.deregister_inactive_clusters().await }
    }));
    tokio::spawn(run_periodic(GC_SWEEP_PERIOD, move || {
        let gc = gc.clone();
        async move { gc.permanently_delete_unregistered_clusters_and_hosts().await }
    }));

    if let Some(lease) = lease_refresh {
        tokio::spawn(run_periodic(LEASE_REFRESH_PERIOD, move || {
            let lease = lease.clone();
            async move { lease.refresh().await }
        }));
    }

    let server = HttpServer::new(move || {
        App::new()
            .app_data(Data::new(state.clone()))
            .wrap(middleware::Logger::default().exclude("/health"))
            .service(index)
            .service(health)
            .service(metrics)
    })
    .bind(args.bind_addr.as_str())?
    .shutdown_timeout(5);

    tokio::join!(controller, server.run()).1?;
    Ok(())
}
