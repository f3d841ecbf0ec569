//! Operational routes under `/system`, guarded by the static key.
//!
//! | Route              | Data |
//! |--------------------|------|
//! | `GET /system/info`    | host, OS and CPU summary |
//! | `GET /system/time`    | current UTC and local time |
//! | `GET /system/usage`   | process and system memory |
//! | `GET /system/process` | pid, uptime, version |
//!
//! Host figures come from `/proc` and are `null` where it is unavailable.
//! Environment variables are never exposed.

use std::sync::{Arc, OnceLock};
use std::time::Instant;

use chrono::{Local, Utc};
use hermes_core::{BoxFuture, FnHandler, GatewayResult, RequestContext};
use hermes_middleware::Pipeline;
use http::Method;
use serde_json::{json, Value};

use super::{Route, RouteTable};

static STARTED: OnceLock<Instant> = OnceLock::new();

/// Adds the system routes to the route table.
pub fn mount(table: &mut RouteTable, pipeline: &Arc<Pipeline>) {
    STARTED.get_or_init(Instant::now);

    let endpoints: [(&str, SystemFn); 4] = [
        ("/system/info", info),
        ("/system/time", time),
        ("/system/usage", usage),
        ("/system/process", process),
    ];
    for (path, func) in endpoints {
        let handler = Arc::new(FnHandler::new(func));
        table.add_route(Method::GET, path, Route::new(Arc::clone(pipeline), handler));
    }
}

type SystemFn = for<'a> fn(&'a mut RequestContext) -> BoxFuture<'a, GatewayResult<Value>>;

fn info(_ctx: &mut RequestContext) -> BoxFuture<'_, GatewayResult<Value>> {
    Box::pin(async move {
        let parallelism = std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get);
        let uptime_secs = probe::system_uptime_secs();
        Ok(json!({
            "availableParallelism": parallelism,
            "os": {
                "platform": std::env::consts::OS,
                "arch": std::env::consts::ARCH,
                "family": std::env::consts::FAMILY,
                "release": probe::kernel_release(),
                "hostname": probe::hostname(),
                "totalMemoryMb": probe::meminfo_kib("MemTotal").map(kib_to_mb),
                "uptimeMins": uptime_secs.map(|s| s / 60.0),
                "uptimeHrs": uptime_secs.map(|s| s / 3600.0),
                "uptimeDays": uptime_secs.map(|s| s / 86_400.0),
                "loadavg": probe::load_average(),
            },
        }))
    })
}

fn time(_ctx: &mut RequestContext) -> BoxFuture<'_, GatewayResult<Value>> {
    Box::pin(async move {
        Ok(json!({
            "utc": Utc::now().to_rfc3339(),
            "local": Local::now().to_rfc3339(),
        }))
    })
}

fn usage(_ctx: &mut RequestContext) -> BoxFuture<'_, GatewayResult<Value>> {
    Box::pin(async move {
        let total = probe::meminfo_kib("MemTotal");
        let free = probe::meminfo_kib("MemAvailable");
        let percent_free = match (free, total) {
            (Some(free), Some(total)) if total > 0 => Some((free * 100 + total / 2) / total),
            _ => None,
        };
        Ok(json!({
            "processMemory": process_memory(),
            "systemMemory": {
                "units": "MB",
                "free": free.map(kib_to_mb),
                "total": total.map(kib_to_mb),
                "percentFree": percent_free,
            },
        }))
    })
}

fn process(ctx: &mut RequestContext) -> BoxFuture<'_, GatewayResult<Value>> {
    Box::pin(async move {
        let uptime = STARTED.get().map(Instant::elapsed).unwrap_or_default();
        Ok(json!({
            "pid": std::process::id(),
            "serviceName": ctx.service_name(),
            "applicationVersion": crate::VERSION,
            "uptimeMins": uptime.as_secs_f64() / 60.0,
            "memUsage": process_memory(),
        }))
    })
}

fn process_memory() -> Value {
    json!({
        "units": "MB",
        "rss": probe::status_kib("VmRSS").map(kib_to_mb),
        "peakRss": probe::status_kib("VmHWM").map(kib_to_mb),
        "virtual": probe::status_kib("VmSize").map(kib_to_mb),
    })
}

fn kib_to_mb(kib: u64) -> f64 {
    kib as f64 / 1024.0
}

/// Readers for `/proc`.
mod probe {
    use std::fs;

    fn kib_field(text: &str, key: &str) -> Option<u64> {
        text.lines().find_map(|line| {
            let (name, rest) = line.split_once(':')?;
            if name.trim() != key {
                return None;
            }
            rest.split_whitespace().next()?.parse().ok()
        })
    }

    pub(super) fn meminfo_kib(key: &str) -> Option<u64> {
        kib_field(&fs::read_to_string("/proc/meminfo").ok()?, key)
    }

    pub(super) fn status_kib(key: &str) -> Option<u64> {
        kib_field(&fs::read_to_string("/proc/self/status").ok()?, key)
    }

    pub(super) fn system_uptime_secs() -> Option<f64> {
        fs::read_to_string("/proc/uptime")
            .ok()?
            .split_whitespace()
            .next()?
            .parse()
            .ok()
    }

    pub(super) fn load_average() -> Option<Vec<f64>> {
        let text = fs::read_to_string("/proc/loadavg").ok()?;
        text.split_whitespace()
            .take(3)
            .map(|v| v.parse().ok())
            .collect()
    }

    pub(super) fn kernel_release() -> Option<String> {
        fs::read_to_string("/proc/sys/kernel/osrelease")
            .ok()
            .map(|s| s.trim().to_string())
    }

    pub(super) fn hostname() -> Option<String> {
        std::env::var("HOSTNAME")
            .ok()
            .or_else(|| fs::read_to_string("/etc/hostname").ok())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_kib_field() {
            let text = "MemTotal:       16318480 kB\nMemFree:         1021344 kB\nMemAvailable:    8123456 kB\n";
            assert_eq!(kib_field(text, "MemTotal"), Some(16_318_480));
            assert_eq!(kib_field(text, "MemAvailable"), Some(8_123_456));
            assert_eq!(kib_field(text, "Mem"), None);
        }
    }
}
