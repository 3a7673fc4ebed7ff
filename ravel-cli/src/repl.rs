//! Command dispatch for the interactive text loop. Grounded on
//! `original_source/cli/dispatcher.cpp` and `commands.cpp`.

use std::io::Write as _;

use ravel_core::RavelContext;

pub enum CommandStatus {
    Ok,
    ExitRequested,
}

struct Command {
    usage: &'static str,
    help: &'static str,
}

const COMMANDS: &[(&str, Command)] = &[
    ("help", Command { usage: "help", help: "Displays this help message." }),
    ("quit", Command { usage: "quit", help: "Exits the application." }),
    ("exit", Command { usage: "exit", help: "Exits the application." }),
    ("open", Command { usage: "open <path>", help: "Opens a binary file on disk." }),
    ("info", Command { usage: "info", help: "Shows details about the current target." }),
    ("ps", Command { usage: "ps", help: "Lists all running processes on the system." }),
    ("attach", Command { usage: "attach <pid>", help: "Attaches to a process by its PID." }),
    ("detach", Command { usage: "detach", help: "Detaches from the currently attached process." }),
    ("regions", Command { usage: "regions", help: "Lists all memory regions of the current target." }),
    ("read", Command { usage: "read <address> [byte_count=256]", help: "Reads memory and displays it as a hexdump." }),
    ("disasm", Command { usage: "disasm <address> [instruction_count=20]", help: "Disassembles code at a given address." }),
];

fn parse_number(s: &str) -> Option<u64> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok()
    } else {
        s.parse().ok()
    }
}

pub fn dispatch(ctx: &mut RavelContext, line: &str) -> CommandStatus {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let Some((&name, args)) = tokens.split_first() else {
        return CommandStatus::Ok;
    };

    match name {
        "help" => handle_help(),
        "quit" | "exit" => return CommandStatus::ExitRequested,
        "open" => handle_open(ctx, args),
        "info" => handle_info(ctx),
        "ps" => handle_ps(ctx),
        "attach" => handle_attach(ctx, args),
        "detach" => handle_detach(ctx),
        "regions" => handle_regions(ctx),
        "read" => handle_read(ctx, args),
        "disasm" => handle_disasm(ctx, args),
        other => eprintln!("Error: Unknown command '{other}'. Type 'help' for a list of commands"),
    }
    CommandStatus::Ok
}

fn handle_help() {
    println!("Available commands:");
    for (name, cmd) in COMMANDS {
        println!("  {name:<15} {}", cmd.usage);
        println!("    {}", cmd.help);
    }
}

fn handle_open(ctx: &mut RavelContext, args: &[&str]) {
    let Some(path) = args.first() else {
        eprintln!("Usage: open <path>");
        return;
    };
    match ctx.open_file(path) {
        Ok(()) => println!("Opened '{path}'."),
        Err(e) => eprintln!("Error: Failed to open '{path}' (code={e}).", e = e as i32),
    }
}

fn handle_info(ctx: &mut RavelContext) {
    if ctx.active_target().is_none() {
        println!("No target loaded.");
        return;
    }
    println!("Target: {}", ctx.name());
    match ctx.entry_point() {
        Some(ep) => println!("Entry point: 0x{ep:016X}"),
        None => println!("Entry point: n/a"),
    }
}

fn handle_ps(ctx: &mut RavelContext) {
    if ctx.active_target().is_none() {
        ctx.open_live();
    }
    match ctx.enumerate_processes() {
        Ok(processes) => {
            println!("{:<10} {:<30} Executable Path", "PID", "Name");
            println!("{}", "-".repeat(80));
            for p in processes {
                println!("{:<10} {:<30} {}", p.pid, p.short_name, p.executable_path);
            }
        }
        Err(e) => eprintln!("Error: Failed to enumerate processes (code={}).", e as i32),
    }
}

fn handle_attach(ctx: &mut RavelContext, args: &[&str]) {
    let Some(pid_str) = args.first() else {
        eprintln!("Usage: attach <pid>");
        return;
    };
    let Some(pid) = parse_number(pid_str).and_then(|v| u32::try_from(v).ok()) else {
        eprintln!("Error: Invalid PID '{pid_str}'.");
        return;
    };
    if ctx.active_target().is_none() || !ctx.is_live() {
        ctx.open_live();
    }
    match ctx.attach(pid) {
        Ok(()) => println!("Successfully attached to process {pid}."),
        Err(e) => eprintln!("Error: Failed to attach to process {pid} (code={}).", e as i32),
    }
}

fn handle_detach(ctx: &mut RavelContext) {
    if !ctx.is_attached() {
        println!("Not attached to any process.");
        return;
    }
    if let Some(pid) = ctx.attached_pid() {
        println!("Detaching from process {pid}.");
    }
    ctx.detach();
}

fn handle_regions(ctx: &mut RavelContext) {
    if ctx.is_live() && !ctx.is_attached() {
        eprintln!("Error: Not attached. Use 'attach <pid>' first.");
        return;
    }
    match ctx.regions() {
        Ok(regions) => {
            println!("{:<18} {:<18} {:<10} {:<10} Name", "Base Address", "End Address", "Size", "Perms");
            println!("{}", "-".repeat(100));
            for r in regions {
                println!(
                    "0x{:016X} 0x{:016X} {:<10} {:<10} {}",
                    r.base, r.end(), r.size, r.perms, r.name
                );
            }
        }
        Err(e) => eprintln!("Error: Failed to get memory regions (code={}).", e as i32),
    }
}

fn handle_read(ctx: &mut RavelContext, args: &[&str]) {
    let Some(addr_str) = args.first() else {
        eprintln!("Usage: read <address> [byte_count=256]");
        return;
    };
    if ctx.is_live() && !ctx.is_attached() {
        eprintln!("Error: Not attached. Use 'attach <pid>' first.");
        return;
    }
    let Some(addr) = parse_number(addr_str) else {
        eprintln!("Error: Invalid address '{addr_str}'.");
        return;
    };
    let count = match args.get(1) {
        Some(s) => match parse_number(s) {
            Some(n) => n as usize,
            None => {
                eprintln!("Error: Invalid byte count '{s}'.");
                return;
            }
        },
        None => 256,
    };

    let mut buffer = vec![0u8; count];
    if let Err(e) = ctx.read(addr, &mut buffer) {
        eprintln!("Error: Failed to read memory at 0x{addr:X} (code={}).", e as i32);
        return;
    }

    print_hexdump(addr, &buffer);
}

fn print_hexdump(base_addr: u64, buffer: &[u8]) {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for chunk_start in (0..buffer.len()).step_by(16) {
        let chunk_end = (chunk_start + 16).min(buffer.len());
        let _ = write!(out, "0x{:016X} | ", base_addr + chunk_start as u64);
        for j in 0..16 {
            if chunk_start + j < chunk_end {
                let _ = write!(out, "{:02X} ", buffer[chunk_start + j]);
            } else {
                let _ = write!(out, "   ");
            }
        }
        let _ = write!(out, "| ");
        for &b in &buffer[chunk_start..chunk_end] {
            let c = if (0x20..=0x7E).contains(&b) { b as char } else { '.' };
            let _ = write!(out, "{c}");
        }
        let _ = writeln!(out);
    }
}

fn handle_disasm(ctx: &mut RavelContext, args: &[&str]) {
    let Some(addr_str) = args.first() else {
        eprintln!("Usage: disasm <address> [instruction_count=20]");
        return;
    };
    if ctx.is_live() && !ctx.is_attached() {
        eprintln!("Error: Not attached. Use 'attach <pid>' first.");
        return;
    }
    let Some(addr) = parse_number(addr_str) else {
        eprintln!("Error: Invalid address '{addr_str}'.");
        return;
    };
    let instruction_count = match args.get(1) {
        Some(s) => match parse_number(s) {
            Some(n) => n as usize,
            None => {
                eprintln!("Error: Invalid instruction count '{s}'.");
                return;
            }
        },
        None => 20,
    };

    let mut buffer = vec![0u8; instruction_count * 15];
    if let Err(e) = ctx.read(addr, &mut buffer) {
        eprintln!("Error: Failed to read memory at 0x{addr:X} (code={}).", e as i32);
        return;
    }

    let mut dis = ravel_core::disasm::Disassembler::new();
    let mut offset = 0usize;
    for _ in 0..instruction_count {
        if offset >= buffer.len() {
            break;
        }
        let ip = addr + offset as u64;
        match dis.format(&buffer[offset..], ip) {
            Some((decoded, text)) => {
                println!("0x{ip:016X}: {text}");
                offset += decoded.length() as usize;
            }
            None => {
                println!("0x{ip:016X}: db {:02X}", buffer[offset]);
                offset += 1;
            }
        }
    }
}
