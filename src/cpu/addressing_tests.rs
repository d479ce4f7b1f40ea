use super::*;

use crate::cpu::{Cpu, StatusFlags};
use crate::cpu_bus::CpuBus;

use BusEvent::{Idle, Read, Write};

/// A bus that records the exact ordered callback sequence. The sequence is
/// the observable contract: reordering reads, writes, or idles within an
/// instruction is non-conforming even when the final registers match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BusEvent {
    Read(u32),
    Write(u32, u8),
    Idle(bool),
}

struct RecordingBus {
    memory: Vec<u8>,
    events: Vec<BusEvent>,
}

impl RecordingBus {
    fn new() -> Self {
        Self {
            memory: vec![0; 0x100_0000],
            events: Vec::new(),
        }
    }

    fn load(&mut self, addr: u32, bytes: &[u8]) {
        for (i, &byte) in bytes.iter().enumerate() {
            self.memory[addr as usize + i] = byte;
        }
    }
}

impl CpuBus for RecordingBus {
    fn read_u8(&mut self, addr: u32) -> u8 {
        self.events.push(BusEvent::Read(addr));
        self.memory[(addr & 0xffffff) as usize]
    }

    fn write_u8(&mut self, addr: u32, value: u8) {
        self.events.push(BusEvent::Write(addr, value));
        self.memory[(addr & 0xffffff) as usize] = value;
    }

    fn idle(&mut self, waiting: bool) {
        self.events.push(BusEvent::Idle(waiting));
    }
}

/// Reset vector at $8000, reset already run, event log cleared.
fn setup_recording(program: &[u8]) -> Cpu<RecordingBus> {
    let mut bus = RecordingBus::new();
    bus.load(0xfffc, &[0x00, 0x80]);
    bus.load(0x8000, program);
    let mut cpu = Cpu::new(bus);
    cpu.step();
    cpu.bus_mut().events.clear();
    cpu
}

#[test]
fn reset_sequence_transcript() {
    let mut bus = RecordingBus::new();
    bus.load(0xfffc, &[0x00, 0x80]);
    let mut cpu = Cpu::new(bus);
    cpu.step();
    assert_eq!(
        cpu.bus().events,
        vec![
            Read(0x000000),
            Idle(false),
            Read(0x000100),
            Read(0x0001ff),
            Read(0x0001fe),
            Read(0x00fffc),
            Read(0x00fffd),
        ]
    );
}

#[test]
fn implied_nop_transcript() {
    let mut cpu = setup_recording(&[0xea]);
    cpu.step();
    assert_eq!(cpu.bus().events, vec![Read(0x8000), Idle(false)]);
}

#[test]
fn lda_immediate_transcript() {
    let mut cpu = setup_recording(&[0xa9, 0x42]);
    cpu.step();
    assert_eq!(cpu.bus().events, vec![Read(0x8000), Read(0x8001)]);
}

#[test]
fn direct_page_access_without_offset() {
    let mut cpu = setup_recording(&[0xa5, 0x10]);
    cpu.step();
    assert_eq!(
        cpu.bus().events,
        vec![Read(0x8000), Read(0x8001), Read(0x000010)]
    );
}

#[test]
fn direct_page_offset_adds_one_idle() {
    let mut cpu = setup_recording(&[0xa5, 0x10]);
    cpu.dp = 0x0001;
    cpu.step();
    assert_eq!(
        cpu.bus().events,
        vec![Read(0x8000), Read(0x8001), Idle(false), Read(0x000011)]
    );
}

#[test]
fn absolute_x_read_idles_only_on_page_cross() {
    let mut cpu = setup_recording(&[0xbd, 0xf0, 0x10]);
    cpu.x = 0x20;
    cpu.step();
    assert_eq!(
        cpu.bus().events,
        vec![
            Read(0x8000),
            Read(0x8001),
            Read(0x8002),
            Idle(false),
            Read(0x001110),
        ]
    );

    let mut cpu = setup_recording(&[0xbd, 0xf0, 0x10]);
    cpu.x = 0x01;
    cpu.step();
    assert_eq!(
        cpu.bus().events,
        vec![Read(0x8000), Read(0x8001), Read(0x8002), Read(0x0010f1)]
    );
}

#[test]
fn absolute_x_write_always_idles() {
    let mut cpu = setup_recording(&[0x9d, 0xf0, 0x10]);
    cpu.x = 0x01;
    cpu.a = 0x42;
    cpu.step();
    assert_eq!(
        cpu.bus().events,
        vec![
            Read(0x8000),
            Read(0x8001),
            Read(0x8002),
            Idle(false),
            Write(0x0010f1, 0x42),
        ]
    );
}

#[test]
fn indirect_y_idles_on_page_cross_only_with_8bit_index_reads() {
    let mut cpu = setup_recording(&[0xb1, 0x10]);
    cpu.bus_mut().load(0x10, &[0x00, 0x20]);
    cpu.y = 0x01;
    cpu.step();
    assert_eq!(
        cpu.bus().events,
        vec![
            Read(0x8000),
            Read(0x8001),
            Read(0x000010),
            Read(0x000011),
            Read(0x002001),
        ]
    );

    let mut cpu = setup_recording(&[0xb1, 0x10]);
    cpu.bus_mut().load(0x10, &[0xf0, 0x20]);
    cpu.y = 0x20;
    cpu.step();
    assert_eq!(
        cpu.bus().events,
        vec![
            Read(0x8000),
            Read(0x8001),
            Read(0x000010),
            Read(0x000011),
            Idle(false),
            Read(0x002110),
        ]
    );
}

#[test]
fn stack_relative_always_idles() {
    let mut cpu = setup_recording(&[0xa3, 0x01]);
    cpu.step();
    assert_eq!(
        cpu.bus().events,
        vec![Read(0x8000), Read(0x8001), Idle(false), Read(0x0001fe)]
    );
}

#[test]
fn stack_relative_indirect_y_idles_around_pointer() {
    let mut cpu = setup_recording(&[0xb3, 0x01]);
    cpu.bus_mut().load(0x01fe, &[0x00, 0x20]);
    cpu.step();
    assert_eq!(
        cpu.bus().events,
        vec![
            Read(0x8000),
            Read(0x8001),
            Idle(false),
            Read(0x0001fe),
            Read(0x0001ff),
            Idle(false),
            Read(0x002000),
        ]
    );
}

#[test]
fn rmw_8bit_reads_idles_then_writes() {
    let mut cpu = setup_recording(&[0x06, 0x10]);
    cpu.bus_mut().load(0x10, &[0x81]);
    cpu.step();
    assert_eq!(
        cpu.bus().events,
        vec![
            Read(0x8000),
            Read(0x8001),
            Read(0x000010),
            Idle(false),
            Write(0x000010, 0x02),
        ]
    );
}

#[test]
fn rmw_16bit_writes_high_byte_first() {
    let mut cpu = setup_recording(&[0xee, 0x34, 0x12]);
    cpu.emulation_mode = false;
    cpu.p.remove(StatusFlags::MEMORY_8BIT);
    cpu.bus_mut().load(0x1234, &[0xff, 0x00]);
    cpu.step();
    assert_eq!(
        cpu.bus().events,
        vec![
            Read(0x8000),
            Read(0x8001),
            Read(0x8002),
            Read(0x001234),
            Read(0x001235),
            Idle(false),
            Write(0x001235, 0x01),
            Write(0x001234, 0x00),
        ]
    );
}

#[test]
fn store_16bit_writes_low_byte_first() {
    let mut cpu = setup_recording(&[0x8d, 0x00, 0x20]);
    cpu.emulation_mode = false;
    cpu.p.remove(StatusFlags::MEMORY_8BIT);
    cpu.a = 0x1234;
    cpu.step();
    assert_eq!(
        cpu.bus().events,
        vec![
            Read(0x8000),
            Read(0x8001),
            Read(0x8002),
            Write(0x002000, 0x34),
            Write(0x002001, 0x12),
        ]
    );
}

#[test]
fn load_16bit_reads_low_byte_first() {
    let mut cpu = setup_recording(&[0xad, 0x00, 0x20]);
    cpu.emulation_mode = false;
    cpu.p.remove(StatusFlags::MEMORY_8BIT);
    cpu.step();
    assert_eq!(
        cpu.bus().events,
        vec![
            Read(0x8000),
            Read(0x8001),
            Read(0x8002),
            Read(0x002000),
            Read(0x002001),
        ]
    );
}

#[test]
fn branch_taken_adds_one_idle() {
    let mut cpu = setup_recording(&[0x80, 0x02]);
    cpu.step();
    assert_eq!(
        cpu.bus().events,
        vec![Read(0x8000), Read(0x8001), Idle(false)]
    );
}

#[test]
fn branch_not_taken_has_no_idle() {
    let mut cpu = setup_recording(&[0xd0, 0x02]);
    cpu.p.insert(StatusFlags::ZERO);
    cpu.step();
    assert_eq!(cpu.bus().events, vec![Read(0x8000), Read(0x8001)]);
}

#[test]
fn wai_transcript_and_waiting_idles() {
    let mut cpu = setup_recording(&[0xcb]);
    cpu.step();
    assert_eq!(
        cpu.bus().events,
        vec![Read(0x8000), Idle(false), Idle(false)]
    );

    cpu.bus_mut().events.clear();
    cpu.step();
    assert_eq!(cpu.bus().events, vec![Idle(true)]);
}

#[test]
fn mvn_transcript_brackets_latch_with_idles() {
    let mut cpu = setup_recording(&[0x54, 0x01, 0x02]);
    cpu.bus_mut().load(0x020000, &[0x5a]);
    cpu.step();
    assert_eq!(
        cpu.bus().events,
        vec![
            Read(0x8000),
            Read(0x8001),
            Read(0x8002),
            Read(0x020000),
            Write(0x010000, 0x5a),
            Idle(false),
            Idle(false),
        ]
    );
}

#[test]
fn pei_transcript_pushes_pointer_word() {
    let mut cpu = setup_recording(&[0xd4, 0x10]);
    cpu.bus_mut().load(0x10, &[0x34, 0x12]);
    cpu.step();
    assert_eq!(
        cpu.bus().events,
        vec![
            Read(0x8000),
            Read(0x8001),
            Read(0x000010),
            Read(0x000011),
            Write(0x0001fd, 0x12),
            Write(0x0001fc, 0x34),
        ]
    );
}

#[test]
fn irq_entry_transcript_in_emulation_mode() {
    let mut cpu = setup_recording(&[0xea]);
    cpu.p.remove(StatusFlags::IRQ_DISABLE);
    cpu.set_irq(true);
    cpu.step();
    assert_eq!(
        cpu.bus().events,
        vec![
            Read(0x8000),
            Idle(false),
            Write(0x0001fd, 0x80),
            Write(0x0001fc, 0x00),
            Write(0x0001fb, 0x20),
            Read(0x00fffe),
            Read(0x00ffff),
        ]
    );
}

#[test]
fn every_step_emits_at_least_one_bus_event() {
    let mut cpu = setup_recording(&[0xea, 0xcb, 0xea]);
    for _ in 0..6 {
        cpu.bus_mut().events.clear();
        cpu.step();
        assert!(!cpu.bus().events.is_empty());
    }
}
