//! Device fact collection.
//!
//! Facts are scraped from show-command output in tolerant mode: a command
//! rejected by the device (absent on older releases) yields its error text as
//! the response and the scrape simply finds nothing. Collected facts land in
//! the module result under `net_<fact>` keys.

use crate::device::AcosDevice;
use crate::modules::{ModuleError, ModuleResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::OnceLock;

/// Selectable fact groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FactSubset {
    Default,
    Hardware,
    Config,
    Interfaces,
}

impl FactSubset {
    pub const ALL: [FactSubset; 4] = [
        FactSubset::Default,
        FactSubset::Hardware,
        FactSubset::Config,
        FactSubset::Interfaces,
    ];

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "default" => Some(FactSubset::Default),
            "hardware" => Some(FactSubset::Hardware),
            "config" => Some(FactSubset::Config),
            "interfaces" => Some(FactSubset::Interfaces),
            _ => None,
        }
    }
}

impl fmt::Display for FactSubset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FactSubset::Default => write!(f, "default"),
            FactSubset::Hardware => write!(f, "hardware"),
            FactSubset::Config => write!(f, "config"),
            FactSubset::Interfaces => write!(f, "interfaces"),
        }
    }
}

/// Resolve a `gather_subset` request into the set of subsets to collect.
///
/// `all` selects every subset; `!name` excludes one; an empty or
/// exclusion-only request starts from everything. The `default` subset is
/// always collected unless explicitly excluded. Unknown names are input
/// validation errors.
pub fn resolve_subsets(requested: &[String]) -> ModuleResult<BTreeSet<FactSubset>> {
    let mut include: BTreeSet<FactSubset> = BTreeSet::new();
    let mut exclude: BTreeSet<FactSubset> = BTreeSet::new();
    let mut any_positive = false;

    for entry in requested {
        let entry = entry.trim();
        let (negated, name) = match entry.strip_prefix('!') {
            Some(name) => (true, name),
            None => (false, entry),
        };

        if name == "all" {
            if negated {
                exclude.extend(FactSubset::ALL);
            } else {
                any_positive = true;
                include.extend(FactSubset::ALL);
            }
            continue;
        }

        let subset = FactSubset::from_name(name).ok_or_else(|| {
            ModuleError::InvalidParameter(format!(
                "Subset must be one of [all, default, hardware, config, interfaces], got {name}"
            ))
        })?;
        if negated {
            exclude.insert(subset);
        } else {
            any_positive = true;
            include.insert(subset);
        }
    }

    if !any_positive {
        include.extend(FactSubset::ALL);
    }
    if !exclude.contains(&FactSubset::Default) {
        include.insert(FactSubset::Default);
    }

    Ok(include.difference(&exclude).copied().collect())
}

/// One ipv4 binding on an interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ipv4Address {
    pub address: String,
    /// Prefix length derived from the dotted subnet mask
    pub subnet: u32,
}

/// One ipv6 binding on an interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ipv6Address {
    pub address: String,
    pub prefix: String,
}

/// Facts scraped for a single interface block.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InterfaceFacts {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub macaddress: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mtu: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplex: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operstatus: Option<String>,
    pub ipv4: Vec<Ipv4Address>,
    pub ipv6: Vec<Ipv6Address>,
}

/// Gathered facts plus any scrape warnings, keyed `net_<fact>`.
#[derive(Debug, Default)]
pub struct FactCollection {
    pub facts: HashMap<String, serde_json::Value>,
    pub warnings: Vec<String>,
}

impl FactCollection {
    fn insert(&mut self, fact: &str, value: serde_json::Value) {
        self.facts.insert(format!("net_{fact}"), value);
    }
}

/// Collect the requested subsets from the device.
pub fn collect(
    device: &AcosDevice,
    subsets: &BTreeSet<FactSubset>,
) -> ModuleResult<FactCollection> {
    let mut collection = FactCollection::default();
    collection.insert(
        "gather_subset",
        serde_json::json!(subsets.iter().map(|s| s.to_string()).collect::<Vec<_>>()),
    );

    for subset in subsets {
        match subset {
            FactSubset::Default => collect_default(device, &mut collection)?,
            FactSubset::Hardware => collect_hardware(device, &mut collection)?,
            FactSubset::Config => collect_config(device, &mut collection)?,
            FactSubset::Interfaces => collect_interfaces(device, &mut collection)?,
        }
    }
    Ok(collection)
}

fn collect_default(device: &AcosDevice, collection: &mut FactCollection) -> ModuleResult<()> {
    let commands = [
        "show license-info | include Host",
        "show bootimage | include primary",
        "show hardware | include Serial",
        "show version | include ACOS",
        "show hardware | include Series",
    ];
    let requests: Vec<_> = commands.iter().map(|c| (*c).into()).collect();
    let responses = device.run_commands(&requests, false)?;

    collection.insert("api", serde_json::json!("cliConf"));
    collection.insert("hostid", serde_json::json!(value_after_colon(&responses[0])));
    if let Some(image) = parse_image(&responses[1]) {
        collection.insert("image", serde_json::json!(image));
    }
    collection.insert("serialnum", serde_json::json!(value_after_colon(&responses[2])));
    collection.insert("version", serde_json::json!(responses[3].trim()));
    collection.insert("model", serde_json::json!(responses[4].trim()));
    Ok(())
}

fn collect_hardware(device: &AcosDevice, collection: &mut FactCollection) -> ModuleResult<()> {
    let responses = device.run_commands(&["show version | section Memory".into()], false)?;

    match parse_memory(&responses[0]) {
        Some((total, free)) => {
            collection.insert("memtotal_mb", serde_json::json!(total));
            collection.insert("memfree_mb", serde_json::json!(free));
        }
        None => collection
            .warnings
            .push("Unable to parse memory information from show version".to_string()),
    }
    Ok(())
}

fn collect_config(device: &AcosDevice, collection: &mut FactCollection) -> ModuleResult<()> {
    let responses = device.run_commands(&["show running-config".into()], false)?;
    collection.insert("config", serde_json::json!(responses[0]));
    Ok(())
}

fn collect_interfaces(device: &AcosDevice, collection: &mut FactCollection) -> ModuleResult<()> {
    let responses = device.run_commands(&["show interfaces".into()], false)?;

    let mut interfaces: BTreeMap<String, InterfaceFacts> = BTreeMap::new();
    let mut all_ipv4 = Vec::new();
    let mut all_ipv6 = Vec::new();

    for block in responses[0].trim().split("\n\n  ") {
        for (key, text) in split_interface_blocks(block) {
            let iface = parse_interface(&text);
            all_ipv4.extend(iface.ipv4.iter().map(|a| a.address.clone()));
            all_ipv6.extend(iface.ipv6.iter().map(|a| a.address.clone()));
            interfaces.insert(key, iface);
        }
    }

    collection.insert("interfaces", serde_json::json!(interfaces));
    collection.insert("all_ipv4_addresses", serde_json::json!(all_ipv4));
    collection.insert("all_ipv6_addresses", serde_json::json!(all_ipv6));
    Ok(())
}

/// The text after the first `:`, trimmed. Used for `Key: value` show output.
fn value_after_colon(text: &str) -> String {
    let text = text.trim();
    match text.find(':') {
        Some(idx) => text[idx + 1..].trim().to_string(),
        None => text.to_string(),
    }
}

fn parse_image(text: &str) -> Option<String> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let re = PATTERN
        .get_or_init(|| Regex::new(r"Hard Disk primary\s*(\S+)").expect("valid literal pattern"));
    re.captures(text.trim()).map(|c| c[1].to_string())
}

fn parse_memory(text: &str) -> Option<(u64, u64)> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let re = PATTERN.get_or_init(|| {
        Regex::new(r"Memory\s+(\d+)\s+Mbyte,\s*Free Memory\s+(\d+)\s+Mbyte")
            .expect("valid literal pattern")
    });
    let caps = re.captures(text)?;
    let total = caps[1].parse().ok()?;
    let free = caps[2].parse().ok()?;
    Some((total, free))
}

/// Group a `show interfaces` block into per-interface text keyed by the
/// interface heading (first two tokens of its opening line). Continuation
/// lines start with whitespace and belong to the interface opened above.
fn split_interface_blocks(block: &str) -> Vec<(String, String)> {
    static HEADING: OnceLock<Regex> = OnceLock::new();
    let heading = HEADING
        .get_or_init(|| Regex::new(r"^((?:\S+\s+)\S+).*").expect("valid literal pattern"));

    let mut order: Vec<String> = Vec::new();
    let mut parsed: BTreeMap<String, String> = BTreeMap::new();
    let mut key = String::new();

    for line in block.lines() {
        if line.is_empty() {
            continue;
        }
        if line.starts_with(' ') {
            if let Some(entry) = parsed.get_mut(&key) {
                entry.push('\n');
                entry.push_str(line);
            }
        } else if let Some(caps) = heading.captures(line) {
            key = caps[1].to_string();
            order.push(key.clone());
            parsed.insert(key.clone(), line.to_string());
        }
    }

    order
        .into_iter()
        .filter_map(|k| parsed.get(&k).map(|v| (k, v.clone())))
        .collect()
}

fn parse_interface(text: &str) -> InterfaceFacts {
    static NAME: OnceLock<Regex> = OnceLock::new();
    static MAC: OnceLock<Regex> = OnceLock::new();
    static MTU: OnceLock<Regex> = OnceLock::new();
    static DUPLEX: OnceLock<Regex> = OnceLock::new();
    static OPER: OnceLock<Regex> = OnceLock::new();
    static IPV4: OnceLock<Regex> = OnceLock::new();
    static MASK: OnceLock<Regex> = OnceLock::new();
    static IPV6: OnceLock<Regex> = OnceLock::new();

    let name = NAME
        .get_or_init(|| Regex::new(r"Interface name is (\S+)").expect("valid literal pattern"));
    let mac = MAC.get_or_init(|| {
        Regex::new(r"Hardware is (?:.*), Address is (\S+)").expect("valid literal pattern")
    });
    let mtu = MTU.get_or_init(|| Regex::new(r"MTU is (\d+)").expect("valid literal pattern"));
    let duplex =
        DUPLEX.get_or_init(|| Regex::new(r"Duplex (\w+)").expect("valid literal pattern"));
    let oper = OPER
        .get_or_init(|| Regex::new(r"(?m)^(?:.+) is (.+),").expect("valid literal pattern"));
    let ipv4 = IPV4
        .get_or_init(|| Regex::new(r"Internet address is (\S+)").expect("valid literal pattern"));
    let mask =
        MASK.get_or_init(|| Regex::new(r"Subnet mask is (\S+)").expect("valid literal pattern"));
    let ipv6 = IPV6.get_or_init(|| {
        Regex::new(r"IPv6 address is (\S+) Prefix (\S+)").expect("valid literal pattern")
    });

    let mut iface = InterfaceFacts {
        name: name
            .captures(text)
            .map(|c| c[1].to_string())
            .unwrap_or_default(),
        macaddress: mac.captures(text).map(|c| c[1].to_string()),
        mtu: mtu.captures(text).and_then(|c| c[1].parse().ok()),
        duplex: duplex.captures(text).map(|c| c[1].to_string()),
        operstatus: oper.captures(text).map(|c| c[1].to_string()),
        ..InterfaceFacts::default()
    };

    let addresses: Vec<String> = ipv4.captures_iter(text).map(|c| c[1].to_string()).collect();
    let masks: Vec<String> = mask.captures_iter(text).map(|c| c[1].to_string()).collect();
    if addresses.len() == masks.len() {
        for (address, mask) in addresses.into_iter().zip(masks) {
            iface.ipv4.push(Ipv4Address {
                address: address.replace(',', ""),
                subnet: prefix_length(&mask),
            });
        }
    }

    for caps in ipv6.captures_iter(text) {
        iface.ipv6.push(Ipv6Address {
            address: caps[1].to_string(),
            prefix: caps[2].to_string(),
        });
    }

    iface
}

/// Prefix length of a dotted-quad mask (count of set bits).
fn prefix_length(mask: &str) -> u32 {
    mask.split('.')
        .filter_map(|octet| octet.parse::<u32>().ok())
        .map(u32::count_ones)
        .sum()
}
