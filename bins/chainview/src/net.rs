use std::net::Ipv4Addr;

use anyhow::{Context, anyhow};

const ROUTE_TABLE: &str = "/proc/net/route";

/// Address of the default route's gateway, where the brokerage gateway runs
/// when the app is inside a container or VM.
pub fn default_gateway() -> anyhow::Result<Ipv4Addr> {
    let table = std::fs::read_to_string(ROUTE_TABLE)
        .with_context(|| format!("cannot read {ROUTE_TABLE}"))?;
    parse_default_gateway(&table).ok_or_else(|| anyhow!("no default route in {ROUTE_TABLE}"))
}

// Columns: Iface Destination Gateway Flags ..., addresses as little-endian hex.
fn parse_default_gateway(table: &str) -> Option<Ipv4Addr> {
    table.lines().skip(1).find_map(|line| {
        let mut fields = line.split_whitespace();
        let _iface = fields.next()?;
        let destination = fields.next()?;
        let gateway = fields.next()?;
        if destination != "00000000" {
            return None;
        }
        let raw = u32::from_str_radix(gateway, 16).ok()?;
        Some(Ipv4Addr::from(raw.to_le_bytes()))
    })
}
