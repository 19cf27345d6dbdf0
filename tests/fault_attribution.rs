//! Fault attribution tests
//!
//! A guard-page violation kills the process by design, so each scenario
//! runs in a child process: the test re-executes its own binary with an
//! environment marker and a `--exact` filter, then inspects the child's
//! exit status and diagnostic output.

use std::env;
use std::io::Write;
use std::process::{Command, Output};
use std::ptr;

use pagepool::Pool;

const CHILD_ENV: &str = "PAGEPOOL_FAULT_CHILD";

fn spawn_child(test_name: &str, scenario: &str) -> Output {
    let exe = env::current_exe().expect("test binary path");
    Command::new(exe)
        .args([test_name, "--exact", "--nocapture", "--test-threads=1"])
        .env(CHILD_ENV, scenario)
        .output()
        .expect("failed to spawn child test process")
}

#[test]
fn guard_page_fault_names_the_owning_pool() {
    if env::var(CHILD_ENV).as_deref() == Ok("guard") {
        // Child: strike the victim's guard page while a second pool is
        // live. The handler must name the victim, then _exit(1).
        let victim = Pool::<u64>::with_expected_elements(512).unwrap();
        let bystander = Pool::<u64>::with_expected_elements(512).unwrap();
        println!("victim-slot={}", victim.registry_slot().index());
        println!("bystander-slot={}", bystander.registry_slot().index());
        std::io::stdout().flush().unwrap();

        unsafe { ptr::write_volatile(victim.region_base() as *mut u8, 1) };
        unreachable!("write into the guard page must trap");
    }

    let out = spawn_child("guard_page_fault_names_the_owning_pool", "guard");
    assert_eq!(out.status.code(), Some(1), "handler must _exit(1)");

    let stdout = String::from_utf8_lossy(&out.stdout);
    // The harness running the child interleaves its own progress output
    // on the same line as the first marker, so anchor on the marker text
    // rather than on line starts.
    let slot_of = |key: &str| -> usize {
        stdout
            .split(key)
            .nth(1)
            .expect("child printed its slots")
            .split_whitespace()
            .next()
            .expect("slot value follows its marker")
            .parse()
            .unwrap()
    };
    let victim = slot_of("victim-slot=");
    let bystander = slot_of("bystander-slot=");
    assert_ne!(victim, bystander);

    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(
        stderr.contains(&format!("allocation fault in allocator #{victim}\n")),
        "expected attribution to allocator #{victim}, got: {stderr}"
    );
    assert!(!stderr.contains(&format!("allocation fault in allocator #{bystander}\n")));
    assert!(!stderr.contains("default allocator"));
}

#[test]
fn unrelated_fault_reports_the_default_allocator() {
    if env::var(CHILD_ENV).as_deref() == Ok("wild") {
        // Child: keep one pool alive so the handler is installed, then
        // write through a wild pointer into the unmapped null page.
        let _pool = Pool::<u64>::with_expected_elements(512).unwrap();
        unsafe { ptr::write_volatile(0x10 as *mut u8, 1) };
        unreachable!("write into the null page must trap");
    }

    let out = spawn_child("unrelated_fault_reports_the_default_allocator", "wild");
    assert_eq!(out.status.code(), Some(1), "handler must _exit(1)");

    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(
        stderr.contains("allocation fault in default allocator\n"),
        "expected default-allocator attribution, got: {stderr}"
    );
    assert!(!stderr.contains("allocation fault in allocator #"));
}
