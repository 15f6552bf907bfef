use crate::extract::NodeAttributes;
use crate::remote::JavaProcess;
use crate::types::{HostOutputs, NodeIdx, NodeRecord};
use std::collections::BTreeMap;

/// Print each host's output under a header line.
pub fn print_host_outputs(outputs: &HostOutputs) {
    for (host, host_outputs) in outputs {
        println!("==> {host} <==");
        for out in host_outputs {
            print!("{out}");
            if !out.is_empty() && !out.ends_with('\n') {
                println!();
            }
        }
    }
}

pub fn print_java_processes(running: &BTreeMap<String, Vec<JavaProcess>>) {
    for (host, processes) in running {
        println!("==> {host} <==");
        for process in processes {
            println!("{:>8}  {}", process.pid, process.name);
        }
    }
}

pub fn print_nodes(app: &str, nodes: &BTreeMap<NodeIdx, NodeRecord>) {
    println!("{app} nodes:");
    for (id, node) in nodes {
        let pid = node.pid.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string());
        println!(
            "  {id:>3}  {:<20} {:<9} pid {:<8} {}",
            node.host,
            node.status.to_string(),
            pid,
            node.log.as_deref().unwrap_or("-")
        );
    }
}

pub fn print_attributes(attributes: &NodeAttributes<NodeIdx>) {
    for (id, values) in attributes {
        for (name, value) in values {
            match value {
                Some(value) => println!("{id}\t{name}\t{value}"),
                None => println!("{id}\t{name}\t(not found)"),
            }
        }
    }
}
