//! afmon - analysis-facility telemetry collector.
//!
//! One invocation samples the enabled subsystems (host counters, batch
//! scheduler, SSH/Jupyter sessions) and posts one JSON record per metric to
//! the configured endpoint. An external scheduler (cron, systemd timer)
//! drives the collection cadence; the only state carried between
//! invocations is the persisted network-counter snapshot.

use std::time::Duration;

use chrono::Utc;
use clap::Parser;
use serde::Serialize;
use tracing::{Level, debug, info, warn};
use tracing_subscriber::EnvFilter;

use afmon::collector::condor::{CondorCollector, QueueSpec};
use afmon::collector::host::HostCollector;
use afmon::collector::host::counters::CounterStore;
use afmon::collector::host::disks::{self, DiskRegistry};
use afmon::collector::sessions::SessionCollector;
use afmon::collector::{CommandRunner, RealFs, RealRunner};
use afmon::report::groups::GroupResolver;
use afmon::report::{
    CondorJobRecord, CpuRecord, DiskRecord, JupyterRecord, MemRecord, NetworkRecord, QueueRecord,
    RecordHeader, SshRecord, obfuscate_host, obfuscate_user, obfuscate_users,
};
use afmon::sink::{FileSink, HttpSink, MetricsSink};

/// Analysis-facility telemetry collector.
#[derive(Parser)]
#[command(name = "afmon", about = "Analysis-facility telemetry collector", version)]
struct Args {
    /// Collect host metrics (cpu, memory, network, disks).
    #[arg(long)]
    host: bool,

    /// Collect ssh session metrics.
    #[arg(short = 's', long)]
    ssh: bool,

    /// Also collect ssh logins from the last 5 minutes
    /// (requires a `last` supporting the -s option).
    #[arg(short = 'S', long)]
    ssh_history: bool,

    /// Collect jupyter notebook metrics.
    #[arg(short = 'j', long)]
    jupyter: bool,

    /// Collect batch (condor) job metrics.
    #[arg(short = 'b', long)]
    batch: bool,

    /// Jupyter pod source as KIND=NAMESPACE=LABEL. Repeatable.
    #[arg(
        long = "jupyter-source",
        value_name = "KIND=NAMESPACE=LABEL",
        default_values_t = [
            "jupyter-ml=af-jupyter=owner".to_string(),
            "jupyter-coffea=coffea-casa=jhub_user".to_string(),
        ]
    )]
    jupyter_sources: Vec<String>,

    /// Queue summary as NAME=CONSTRAINT. Repeatable; no queues, no summaries.
    #[arg(long = "queue", value_name = "NAME=CONSTRAINT")]
    queues: Vec<String>,

    /// Ingest token attached to every record.
    #[arg(short = 't', long, default_value = "")]
    token: String,

    /// Name of the analysis-facility cluster.
    #[arg(short = 'c', long, default_value = "UC-AF")]
    cluster: String,

    /// Metrics endpoint URL.
    #[arg(short = 'u', long, default_value = "https://af.atlas-ml.org/")]
    url: String,

    /// Mount points tracked for disk metrics.
    #[arg(long, value_delimiter = ',', default_value = "/home,/data,/scratch")]
    disks: Vec<String>,

    /// Path of the persisted network-counter snapshot.
    #[arg(long, default_value = "/run/afmon.json")]
    state_file: String,

    /// Staleness window in seconds for the persisted snapshot.
    #[arg(long, default_value = "3600")]
    max_age: u64,

    /// Window in seconds between the two disk I/O samples.
    #[arg(long, default_value = "1")]
    disk_window: u64,

    /// Service account excluded from job queries.
    #[arg(long, default_value = "atlas-coffea")]
    exclude_owner: String,

    /// Completion-time lookback in seconds for the job history query.
    #[arg(long, default_value = "360")]
    history_since: u64,

    /// Path to the proc filesystem (for testing/mocking).
    #[arg(long, default_value = "/proc")]
    proc_path: String,

    /// Hash usernames before posting.
    #[arg(short = 'o', long)]
    obfuscate_users: bool,

    /// Replace hostnames with atlas<digits>.<DOMAIN> before posting.
    #[arg(short = 'O', long, value_name = "DOMAIN", default_value = "")]
    obfuscate_hosts: String,

    /// Salt added to the username hash.
    #[arg(short = 'z', long, default_value = "")]
    salt: String,

    /// Only report users belonging to this unix group.
    #[arg(short = 'g', long, default_value = "")]
    group: String,

    /// Append records to local json files instead of posting.
    #[arg(short = 'd', long)]
    debug_local: bool,

    /// Increase logging verbosity (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

/// Initializes the tracing subscriber with the appropriate log level.
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(format!("afmon={}", level).parse().unwrap());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Picks the sink for one subsystem: a local debug file or the endpoint.
fn make_sink(args: &Args, debug_file: &str) -> Option<Box<dyn MetricsSink>> {
    if args.debug_local {
        return Some(Box::new(FileSink::new(debug_file)));
    }
    match HttpSink::new(&args.url) {
        Ok(sink) => Some(Box::new(sink)),
        Err(e) => {
            warn!("cannot create HTTP sink for {}: {}", args.url, e);
            None
        }
    }
}

/// Serializes and posts one record; failures are logged, never fatal.
fn post_record(sink: &dyn MetricsSink, record: &impl Serialize) {
    let value = match serde_json::to_value(record) {
        Ok(value) => value,
        Err(e) => {
            warn!("cannot serialize record: {}", e);
            return;
        }
    };

    debug!("posting record: {}", value);
    if let Err(e) = sink.post(&value) {
        warn!("failed to post record: {}", e);
    }
}

/// Machine hostname via the `hostname` command.
fn get_hostname(runner: &impl CommandRunner) -> String {
    runner
        .run("hostname", &[])
        .map(|out| out.trim().to_string())
        .unwrap_or_default()
}

/// Parses a `NAME=VALUE`-style pair, returning None (with a warning) on
/// malformed input.
fn split_pair<'a>(spec: &'a str, what: &str) -> Option<(&'a str, &'a str)> {
    match spec.split_once('=') {
        Some((name, value)) if !name.is_empty() => Some((name, value)),
        _ => {
            warn!("ignoring malformed {} spec {:?}", what, spec);
            None
        }
    }
}

fn collect_host(args: &Args, login_node: &str) {
    info!("collecting host metrics");
    let Some(sink) = make_sink(args, "host.json") else {
        return;
    };

    let fs = RealFs::new();
    let host = HostCollector::new(fs, &args.proc_path);
    let header = |kind: &str| RecordHeader::on_node(&args.token, kind, &args.cluster, login_node);

    match host.load() {
        Ok(load) => post_record(&*sink, &CpuRecord {
            header: header("CPU"),
            load: load.load1,
        }),
        Err(e) => warn!("load collection failed: {}", e),
    }

    match host.memory() {
        Ok(mem) => post_record(&*sink, &MemRecord {
            header: header("MEM"),
            total: mem.total,
            available: mem.available,
        }),
        Err(e) => warn!("memory collection failed: {}", e),
    }

    match host.net_counters() {
        Ok(counters) => {
            let store = CounterStore::new(
                fs,
                &args.state_file,
                Duration::from_secs(args.max_age),
            );
            let delta = store.delta_at(counters, Utc::now().timestamp_millis());
            post_record(&*sink, &NetworkRecord {
                header: header("NETWORK"),
                network: delta,
            });
        }
        Err(e) => warn!("network collection failed: {}", e),
    }

    // Two diskstats samples a short window apart; the deltas cover that
    // window. Mounts missing from the mount table report space only.
    let mut registry = DiskRegistry::new(fs, &args.proc_path, &args.disks);
    registry.sample_all();
    std::thread::sleep(Duration::from_secs(args.disk_window));
    registry.sample_all();

    for disk in registry.disks() {
        let space = match disks::utilization(&disk.path) {
            Ok(space) => space,
            Err(e) => {
                warn!("space query failed for {}: {}", disk.path, e);
                continue;
            }
        };

        post_record(&*sink, &DiskRecord {
            header: header("DISK"),
            device: (!disk.device.is_empty()).then(|| disk.device.clone()),
            mount: disk.path.clone(),
            space,
            iostat: disk.delta,
        });
    }
}

fn collect_ssh(args: &Args, resolver: Option<&GroupResolver>, login_node: &str) {
    info!("collecting ssh metrics");
    let Some(sink) = make_sink(args, "ssh.json") else {
        return;
    };

    let sessions = SessionCollector::new(RealRunner::new());
    let mut users = match sessions.ssh_users() {
        Ok(users) => users,
        Err(e) => {
            warn!("ssh user listing failed: {}", e);
            Vec::new()
        }
    };

    if args.ssh_history {
        match sessions.ssh_history() {
            Ok(recent) => users.extend(recent),
            Err(e) => warn!("ssh history listing failed: {}", e),
        }
    }

    if let Some(resolver) = resolver {
        users = resolver.filter_members(users, &args.group);
    }
    if args.obfuscate_users {
        obfuscate_users(&args.salt, &mut users);
    }
    info!("af ssh users: {:?}", users);

    post_record(&*sink, &SshRecord {
        header: RecordHeader::on_node(&args.token, "ssh", &args.cluster, login_node),
        ssh_user_count: users.len(),
        users,
    });
}

fn collect_jupyter(args: &Args, resolver: Option<&GroupResolver>) {
    let Some(sink) = make_sink(args, "jupyter-debug.json") else {
        return;
    };

    let sessions = SessionCollector::new(RealRunner::new());
    for source in &args.jupyter_sources {
        let Some((kind, rest)) = split_pair(source, "jupyter source") else {
            continue;
        };
        let Some((namespace, label)) = split_pair(rest, "jupyter source") else {
            continue;
        };

        info!("collecting {} metrics", kind);
        let mut users = match sessions.jupyter_users(namespace, label) {
            Ok(users) => users,
            Err(e) => {
                warn!("notebook listing failed for {}: {}", namespace, e);
                Vec::new()
            }
        };

        if let Some(resolver) = resolver {
            users = resolver.filter_members(users, &args.group);
        }
        if args.obfuscate_users {
            obfuscate_users(&args.salt, &mut users);
        }
        info!("af {} users: {:?}", kind, users);

        post_record(&*sink, &JupyterRecord {
            header: RecordHeader::new(&args.token, kind, &args.cluster),
            jupyter_user_count: users.len(),
            users,
        });
    }
}

fn collect_batch(args: &Args, resolver: Option<&GroupResolver>) {
    info!("collecting batch metrics - current jobs");
    let Some(sink) = make_sink(args, "condor.json") else {
        return;
    };

    let condor = CondorCollector::new(RealRunner::new());

    let mut jobs = match condor.active_jobs(&args.exclude_owner) {
        Ok(jobs) => jobs,
        Err(e) => {
            warn!("active job query failed: {}", e);
            Vec::new()
        }
    };

    info!("collecting batch metrics - job history");
    let completed_after = Utc::now().timestamp() - args.history_since as i64;
    match condor.history_jobs(4, completed_after, &args.exclude_owner) {
        Ok(finished) => jobs.extend(finished),
        Err(e) => warn!("job history query failed: {}", e),
    }

    let mut posted = 0usize;
    for mut job in jobs {
        if let Some(resolver) = resolver
            && !resolver.user_in_group(&job.owner, &args.group)
        {
            continue;
        }
        if args.obfuscate_users {
            job.owner = obfuscate_user(&args.salt, &job.owner);
        }

        post_record(&*sink, &CondorJobRecord {
            header: RecordHeader::new(&args.token, "condorjob", &args.cluster),
            job,
        });
        posted += 1;
    }
    info!("posted {} job records", posted);

    let queues: Vec<QueueSpec> = args
        .queues
        .iter()
        .filter_map(|spec| split_pair(spec, "queue"))
        .map(|(name, constraint)| QueueSpec {
            name: name.to_string(),
            constraint: constraint.to_string(),
        })
        .collect();

    if queues.is_empty() {
        debug!("no queues configured, skipping queue summaries");
        return;
    }

    match condor.summarize_queues(&queues) {
        Ok(summaries) => {
            for summary in summaries {
                post_record(&*sink, &QueueRecord {
                    header: RecordHeader::new(&args.token, "condorqueue", &args.cluster),
                    summary,
                });
            }
        }
        Err(e) => warn!("queue summary failed: {}", e),
    }
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    info!("afmon {} starting", env!("CARGO_PKG_VERSION"));

    let runner = RealRunner::new();
    let hostname = get_hostname(&runner);
    let login_node = if args.obfuscate_hosts.is_empty() {
        hostname
    } else {
        obfuscate_host(&hostname, &args.obfuscate_hosts)
    };

    let resolver = if args.group.is_empty() {
        None
    } else {
        Some(GroupResolver::load(&RealFs::new()))
    };

    if args.jupyter {
        collect_jupyter(&args, resolver.as_ref());
    }
    if args.ssh {
        collect_ssh(&args, resolver.as_ref(), &login_node);
    }
    if args.host {
        collect_host(&args, &login_node);
    }
    if args.batch {
        collect_batch(&args, resolver.as_ref());
    }

    info!("collection complete");
}
