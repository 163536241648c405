//! Sample probe-script generator
//!
//! Emits a small JSON Lines script on stdout: a module load, the four
//! probe attachments, a burst of allocations with matching frees, and a
//! severe fault whose instruction pointer lands inside a freed chunk.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --example record-script > trace.jsonl
//! cargo run -- trace.jsonl
//! ```

use heapscope::replay::{RegisterSpec, ScriptAllocOp, ScriptEvent, ScriptOp, ScriptReason};

fn main() {
    let mut events = vec![
        ScriptEvent::Target { pid: 1234 },
        ScriptEvent::ModuleLoad {
            name: "app.exe".to_string(),
            base: 0x40_0000,
            end: 0x45_0000,
        },
        ScriptEvent::ModuleLoad {
            name: "ntdll.dll".to_string(),
            base: 0x7700_0000,
            end: 0x7710_0000,
        },
    ];
    for op in [ScriptOp::Alloc, ScriptOp::Realloc, ScriptOp::Virtualalloc, ScriptOp::Free] {
        events.push(ScriptEvent::ProbeAttached { op, address: 0x7700_1000 });
    }

    // a burst of allocations, half of them freed again
    for i in 0..8u64 {
        let addr = 0x1_0000 + i * 0x1000;
        events.push(ScriptEvent::AllocEntry {
            op: ScriptAllocOp::Alloc,
            tid: 1 + u32::try_from(i % 2).unwrap(),
            size: 0x40 + i * 0x10,
        });
        events.push(ScriptEvent::AllocExit {
            op: ScriptAllocOp::Alloc,
            tid: 1 + u32::try_from(i % 2).unwrap(),
            ret: addr,
            caller: 0x40_1000 + i * 0x20,
        });
        if i % 2 == 0 {
            events.push(ScriptEvent::Free { addr, caller: 0x40_2000 });
        }
    }

    // crash with RIP inside the first (freed) chunk
    events.push(ScriptEvent::Fault {
        reason: ScriptReason::Exception,
        code: 0xC000_0005,
        registers: RegisterSpec { rip: 0x1_0020, rsp: 0x12_F000, ..RegisterSpec::default() },
    });

    for event in events {
        println!("{}", serde_json::to_string(&event).expect("event serializes"));
    }
}
