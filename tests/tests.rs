use mu16::assembler::assemble_str;
use mu16::charset::CharSet;
use mu16::emulator::bus::Bus;
use mu16::emulator::cpu::Cpu;
use mu16::emulator::devices::memory::MemoryDevice;
use mu16::emulator::devices::Device;
use mu16::error::StopReason;

fn assembled(src: &str) -> Vec<u8> {
    assemble_str("t.asm", src, CharSet::Cp437).unwrap()
}

fn loaded(bytes: &[u8]) -> (Cpu, Bus) {
    let mut mem = MemoryDevice::new("ram", 0x0000, 0xFFFF, false);
    mem.load_program(bytes, 0).unwrap();
    let mut bus = Bus::new();
    bus.attach(Box::new(mem));
    (Cpu::new(1_000_000), bus)
}

// Scenario 1: HALT is immediate.
#[test]
fn scenario_halt_is_immediate() {
    let (mut cpu, mut bus) = loaded(&assembled("HALT\nMOV r1, 0x11\n"));
    let reason = cpu.run(&mut bus, -1, None).unwrap();
    assert_eq!(reason, StopReason::Halt);
    assert_eq!(cpu.cycles, 1);
    assert_eq!(cpu.regs[1], 0);
}

// Scenario 2: MOV imm16.
#[test]
fn scenario_mov_imm16() {
    let (mut cpu, mut bus) = loaded(&assembled("MOV r0, 0xFE73\n"));
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.regs[0], 0xFE73);
    assert!(cpu.flags.n);
    assert!(!cpu.flags.z);
}

// Scenario 3: arithmetic flags via CMP.
#[test]
fn scenario_arithmetic_flags() {
    let (mut cpu, mut bus) = loaded(&assembled("CMP r0, r1\nCMP r1, r2\n"));
    cpu.regs[0] = 2;
    cpu.regs[1] = 3;
    cpu.regs[2] = 3;
    cpu.step(&mut bus).unwrap();
    assert!(!cpu.flags.z);
    assert!(cpu.flags.n);
    cpu.step(&mut bus).unwrap();
    assert!(cpu.flags.z);
    assert!(!cpu.flags.n);
}

// Scenario 4: indirect byte with offset crossing the address-space wrap.
#[test]
fn scenario_indirect_offset_wraps() {
    let bytes = assembled("LOADB r3, [r2 + 1]\n");
    let mut mem = MemoryDevice::new("ram", 0x0000, 0xFFFF, false);
    mem.load_program(&bytes, 0x2000).unwrap();
    mem.write_byte(0x0000, 42).unwrap();
    let mut bus = Bus::new();
    bus.attach(Box::new(mem));
    let mut cpu = Cpu::new(1_000_000);
    cpu.regs[8] = 0x2000;
    cpu.regs[2] = 0xFFFF;
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.regs[3], 42);
}

// Scenario 5: push/pop round trip.
#[test]
fn scenario_push_pop_round_trip() {
    let (mut cpu, mut bus) = loaded(&assembled("PUSH r3\nPOP r2\n"));
    cpu.regs[3] = 0xABCD;
    let sp_before = cpu.regs[7];
    cpu.run(&mut bus, 2, None).unwrap();
    assert_eq!(cpu.regs[2], 0xABCD);
    assert_eq!(cpu.regs[7], sp_before);
}

// Scenario 6: call/ret round trip.
#[test]
fn scenario_call_ret_round_trip() {
    let (mut cpu, mut bus) = loaded(&assembled("CALL 0x0100\n"));
    // Place a bare RET at 0x0100 directly; the CALL target is a fixed
    // literal address, independent of where the RET bytes come from.
    let ret = assembled("RET\n");
    bus.write_byte(0x0100, ret[0]).unwrap();
    bus.write_byte(0x0101, ret[1]).unwrap();
    let sp_before = cpu.regs[7];
    let after_call = cpu.pc() + 4; // CALL imm16 is 4 bytes
    cpu.run(&mut bus, 2, None).unwrap();
    assert_eq!(cpu.pc(), after_call);
    assert_eq!(cpu.regs[7], sp_before);
}

// Invariant: re-parsing and re-emitting a program is byte-identical.
#[test]
fn invariant_reassembly_is_stable() {
    let src = "start:\nMOV r0, 0x1234\nADD r0, r1\nCALL start\nHALT\n";
    assert_eq!(assembled(src), assembled(src));
}

// Invariant: word accesses match the two-byte big-endian decomposition.
#[test]
fn invariant_word_access_matches_byte_pair() {
    let mut bus = Bus::new();
    bus.attach(Box::new(MemoryDevice::new("ram", 0x0000, 0xFFFF, false)));
    bus.write_word(0x10, 0x1234).unwrap();
    let hi = bus.read_byte(0x10).unwrap();
    let lo = bus.read_byte(0x11).unwrap();
    let word = bus.read_word(0x10).unwrap();
    assert_eq!(word, ((hi as u16) << 8) | lo as u16);
}

// Invariant: SP always lands inside the stack region after a stack update.
#[test]
fn invariant_sp_stays_in_stack_region() {
    let (mut cpu, mut bus) = loaded(&assembled("PUSH r0\nPUSH r0\nPOP r1\n"));
    for _ in 0..3 {
        cpu.step(&mut bus).unwrap();
        assert!(cpu.regs[7] >= 0xE000);
    }
}

/// Small deterministic PRNG for the property tests below; no external
/// crate appears in the retrieved corpus for this, per SPEC_FULL.md §6.5.
struct Xorshift32(u32);

impl Xorshift32 {
    fn new(seed: u32) -> Self {
        Self(seed | 1)
    }

    fn next_u32(&mut self) -> u32 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.0 = x;
        x
    }

    fn next_u16(&mut self) -> u16 {
        (self.next_u32() & 0xFFFF) as u16
    }

    fn choose<'a, T>(&mut self, options: &'a [T]) -> &'a T {
        &options[self.next_u32() as usize % options.len()]
    }
}

/// A byte-for-byte reinterpretation of the ADD/SUB/AND/OR/XOR semantics
/// `cpu.rs` implements, used as the "reference interpreter" for the
/// random MOV-imm + ALU-reg property test.
fn reference_alu(op: &str, a: u16, b: u16) -> u16 {
    match op {
        "ADD" => a.wrapping_add(b),
        "SUB" => a.wrapping_sub(b),
        "AND" => a & b,
        "OR" => a | b,
        "XOR" => a ^ b,
        _ => unreachable!(),
    }
}

#[test]
fn property_random_mov_alu_programs_match_reference() {
    let mut rng = Xorshift32::new(0xC0FFEE);
    let ops = ["ADD", "SUB", "AND", "OR", "XOR"];

    for _ in 0..50 {
        let imm0 = rng.next_u16();
        let imm1 = rng.next_u16();
        let op = rng.choose(&ops);
        let src = format!("MOV r0, {imm0}\nMOV r1, {imm1}\n{op} r0, r1\nHALT\n");
        let (mut cpu, mut bus) = loaded(&assembled(&src));
        cpu.run(&mut bus, -1, None).unwrap();
        assert_eq!(cpu.regs[0], reference_alu(op, imm0, imm1));
    }
}

#[test]
fn property_balanced_push_pop_preserves_sp() {
    let mut rng = Xorshift32::new(0x5EED);

    for _ in 0..50 {
        let depth = 1 + (rng.next_u32() % 6) as usize;
        let mut src = String::new();
        for _ in 0..depth {
            src.push_str("PUSH r0\n");
        }
        for _ in 0..depth {
            src.push_str("POP r1\n");
        }
        let (mut cpu, mut bus) = loaded(&assembled(&src));
        cpu.regs[0] = rng.next_u16();
        let sp_before = cpu.regs[7];
        cpu.run(&mut bus, (2 * depth) as i64, None).unwrap();
        assert_eq!(cpu.regs[7], sp_before);
    }
}
