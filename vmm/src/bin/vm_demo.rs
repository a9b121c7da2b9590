//! A small CLI harness that drives a [`vmm::VmManager`] over
//! [`vmm::host::SimHost`] through the scenarios from spec §8, logging each
//! state transition. Not part of the library's public contract.

use std::thread;
use std::time::Duration;

use anyhow::{bail, Result};
use argh::FromArgs;

use vmm::host::SimHost;
use vmm::{FaultOutcome, ManagerConfig, VmManager};

#[derive(FromArgs)]
/// Drive the virtual memory manager through a demonstration scenario.
struct Args {
    #[argh(subcommand)]
    scenario: Scenario,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Scenario {
    Cold(ColdFault),
    Overcommit(OvercommitTrim),
    Repurpose(RepurposeStandby),
    RatioDemo(RatioDemo),
}

#[derive(FromArgs)]
/// Fault a fresh page, write a marker, read it back.
#[argh(subcommand, name = "cold-fault")]
struct ColdFault {}

#[derive(FromArgs)]
/// Fault more pages than the physical pool holds and watch a trim + write
/// cycle resolve the pressure.
#[argh(subcommand, name = "overcommit-trim")]
struct OvercommitTrim {}

#[derive(FromArgs)]
/// Force a page to Standby, then fault an unseen page to repurpose it.
#[argh(subcommand, name = "repurpose")]
struct RepurposeStandby {}

#[derive(FromArgs)]
/// Size a pool with spec.md §3's typical 1:64 overcommit ratio and fault
/// enough pages to put it under pressure.
#[argh(subcommand, name = "ratio-demo")]
struct RatioDemo {}

fn main() -> Result<()> {
    init_logging();
    let args: Args = argh::from_env();

    match args.scenario {
        Scenario::Cold(_) => cold_fault(),
        Scenario::Overcommit(_) => overcommit_trim(),
        Scenario::Repurpose(_) => repurpose(),
        Scenario::RatioDemo(_) => ratio_demo(),
    }
}

fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

fn fault_until_success(manager: &VmManager<SimHost>, va: vmm::types::VirtAddr) {
    loop {
        match manager.page_fault_handler(va) {
            FaultOutcome::Success => return,
            FaultOutcome::Redo => {
                log::info!("fault on {va} returned Redo, waiting for reclaim");
                thread::sleep(Duration::from_millis(5));
            }
        }
    }
}

fn cold_fault() -> Result<()> {
    let host = SimHost::new(2, vmm::config::PAGE_SIZE);
    let config = ManagerConfig {
        virtual_pages: 4,
        physical_pages: 2,
        pagefile_slots: 4,
        batch_size: 2,
    };
    let manager = VmManager::initialize(config, host.clone())?;

    let va0 = manager.va_of(vmm::types::VirtPageNum::new(0));
    fault_until_success(&manager, va0);
    log::info!("cold fault on {va0} succeeded");

    let marker = [0xAAu8; 4096];
    host.user_write(va0, &marker);
    let mut back = vec![0u8; 4096];
    host.user_read(va0, &mut back);
    if back != marker {
        bail!("read-back after cold fault did not match what was written");
    }
    log::info!("marker round-tripped through {va0}");
    Ok(())
}

fn overcommit_trim() -> Result<()> {
    let host = SimHost::new(2, vmm::config::PAGE_SIZE);
    let config = ManagerConfig {
        virtual_pages: 4,
        physical_pages: 2,
        pagefile_slots: 4,
        batch_size: 2,
    };
    let manager = VmManager::initialize(config, host)?;

    for i in 0..3 {
        let va = manager.va_of(vmm::types::VirtPageNum::new(i));
        fault_until_success(&manager, va);
        log::info!("fault #{i} on {va} resolved");
    }
    log::info!(
        "active pages after overcommit: {}, standby: {}",
        manager.active_count(),
        manager.standby_len()
    );
    Ok(())
}

fn repurpose() -> Result<()> {
    let host = SimHost::new(1, vmm::config::PAGE_SIZE);
    let config = ManagerConfig {
        virtual_pages: 3,
        physical_pages: 1,
        pagefile_slots: 3,
        batch_size: 1,
    };
    let manager = VmManager::initialize(config, host)?;

    let va0 = manager.va_of(vmm::types::VirtPageNum::new(0));
    fault_until_success(&manager, va0);

    let va1 = manager.va_of(vmm::types::VirtPageNum::new(1));
    fault_until_success(&manager, va1);
    log::info!("{va1} repurposed the only physical frame away from {va0}");

    Ok(())
}

fn ratio_demo() -> Result<()> {
    // spec.md §3: "N_p << N_v (typical ratio 1:64)".
    let config = ManagerConfig::with_overcommit_ratio(256, 64);
    let physical_pages = config.physical_pages;
    log::info!(
        "sized pool at the spec's typical 1:64 overcommit ratio: {} virtual pages, {physical_pages} \
         physical frames, {} pagefile slots",
        config.virtual_pages,
        config.pagefile_slots
    );

    let host = SimHost::new(physical_pages, vmm::config::PAGE_SIZE);
    let manager = VmManager::initialize(config, host)?;

    let fault_count = physical_pages * 2;
    for i in 0..fault_count {
        let va = manager.va_of(vmm::types::VirtPageNum::new(i));
        fault_until_success(&manager, va);
    }
    log::info!(
        "after faulting {fault_count} pages against a {physical_pages}-frame pool: active={}, \
         standby={}",
        manager.active_count(),
        manager.standby_len()
    );
    Ok(())
}
