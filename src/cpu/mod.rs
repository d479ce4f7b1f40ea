//! 65C816 CPU core.
//!
//! One [`Cpu::step`] call executes exactly one instruction, one interrupt
//! sequence, or one idle slice (WAI/STP), driving the bus with the same
//! ordered sequence of reads, writes, and internal cycles as the real
//! processor. The interrupt latch (`int_wanted`) is recomputed at fixed
//! points interleaved with that bus traffic; a latched interrupt is taken
//! at the top of the next step.

use bitflags::bitflags;

use crate::cpu_bus::CpuBus;
use crate::debug_flags;


bitflags! {
    /// Processor status register (P). The stored bits are the pushed byte:
    /// bit 5 doubles as the accumulator width select (M) and bit 4 as the
    /// index width select (X, the B flag on pushes from BRK).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StatusFlags: u8 {
        const CARRY = 0x01;
        const ZERO = 0x02;
        const IRQ_DISABLE = 0x04;
        const DECIMAL = 0x08;
        const INDEX_8BIT = 0x10;
        const MEMORY_8BIT = 0x20;
        const OVERFLOW = 0x40;
        const NEGATIVE = 0x80;
    }
}

/// Read-only snapshot of the register file, for tracing and debuggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebugState {
    pub a: u16,
    pub x: u16,
    pub y: u16,
    pub sp: u16,
    pub pc: u16,
    pub dp: u16,
    pub pb: u8,
    pub db: u8,
    pub c: bool,
    pub z: bool,
    pub v: bool,
    pub n: bool,
    pub i: bool,
    pub d: bool,
    pub xf: bool,
    pub mf: bool,
    pub e: bool,
}

/// 65C816 core. Owns its bus for the lifetime of the core; the bus is the
/// only channel to the outside world.
pub struct Cpu<B: CpuBus> {
    bus: B,
    a: u16,
    x: u16,
    y: u16,
    sp: u16,
    pc: u16,
    dp: u16,
    pb: u8,
    db: u8,
    p: StatusFlags,
    emulation_mode: bool,
    waiting: bool,
    stopped: bool,
    irq_wanted: bool,
    nmi_wanted: bool,
    int_wanted: bool,
    reset_wanted: bool,
}

impl<B: CpuBus> Cpu<B> {
    /// The first `step` after construction performs the reset sequence.
    pub fn new(bus: B) -> Self {
        let mut cpu = Self {
            bus,
            a: 0,
            x: 0,
            y: 0,
            sp: 0,
            pc: 0,
            dp: 0,
            pb: 0,
            db: 0,
            p: StatusFlags::empty(),
            emulation_mode: false,
            waiting: false,
            stopped: false,
            irq_wanted: false,
            nmi_wanted: false,
            int_wanted: false,
            reset_wanted: false,
        };
        cpu.reset(true);
        cpu
    }

    /// Requests a reset; the sequence runs on the next `step`. A hard reset
    /// additionally zeroes the whole register file and drops a pending IRQ.
    pub fn reset(&mut self, hard: bool) {
        if hard {
            self.a = 0;
            self.x = 0;
            self.y = 0;
            self.sp = 0;
            self.pc = 0;
            self.dp = 0;
            self.pb = 0;
            self.db = 0;
            self.p = StatusFlags::empty();
            self.emulation_mode = false;
            self.irq_wanted = false;
        }
        self.waiting = false;
        self.stopped = false;
        self.nmi_wanted = false;
        self.int_wanted = false;
        self.reset_wanted = true;
    }

    /// Edge-triggered NMI request.
    pub fn request_nmi(&mut self) {
        self.nmi_wanted = true;
    }

    /// Level-triggered IRQ line.
    pub fn set_irq(&mut self, state: bool) {
        self.irq_wanted = state;
    }

    pub fn debug_state(&self) -> DebugState {
        DebugState {
            a: self.a,
            x: self.x,
            y: self.y,
            sp: self.sp,
            pc: self.pc,
            dp: self.dp,
            pb: self.pb,
            db: self.db,
            c: self.p.contains(StatusFlags::CARRY),
            z: self.p.contains(StatusFlags::ZERO),
            v: self.p.contains(StatusFlags::OVERFLOW),
            n: self.p.contains(StatusFlags::NEGATIVE),
            i: self.p.contains(StatusFlags::IRQ_DISABLE),
            d: self.p.contains(StatusFlags::DECIMAL),
            xf: self.p.contains(StatusFlags::INDEX_8BIT),
            mf: self.p.contains(StatusFlags::MEMORY_8BIT),
            e: self.emulation_mode,
        }
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    pub fn into_bus(self) -> B {
        self.bus
    }

    /// Advances the machine by one unit of work: the pending reset sequence,
    /// one idle slice while stopped or waiting, one hardware-interrupt
    /// sequence, or one instruction.
    pub fn step(&mut self) {
        if self.reset_wanted {
            self.reset_wanted = false;
            // Dummy fetch of the current PC, then three internal stack reads
            // constrained to page 1 while SP walks down.
            self.read(((self.pb as u32) << 16) | self.pc as u32);
            self.idle();
            for _ in 0..3 {
                let addr = 0x100 | (self.sp & 0xff) as u32;
                self.read(addr);
                self.sp = self.sp.wrapping_sub(1);
            }
            self.sp = (self.sp & 0xff) | 0x100;
            self.emulation_mode = true;
            self.p.insert(StatusFlags::IRQ_DISABLE);
            self.p.remove(StatusFlags::DECIMAL);
            let flags = self.p.bits();
            self.set_flags_byte(flags);
            self.pb = 0;
            self.pc = self.read_word(0xfffc, 0xfffd, false);
            return;
        }

        if self.stopped {
            self.idle_wait();
            return;
        }

        if self.waiting {
            if !(self.irq_wanted || self.nmi_wanted) {
                self.idle_wait();
                return;
            }
            // Wake: latch between two internal cycles, then fall through to
            // interrupt service or the next fetch within this same step.
            self.waiting = false;
            self.idle();
            self.check_interrupts();
            self.idle();
        } else {
            self.check_interrupts();
        }

        if self.int_wanted {
            self.read(((self.pb as u32) << 16) | self.pc as u32);
            self.do_interrupt();
        } else {
            let (pb, pc) = (self.pb, self.pc);
            let opcode = self.read_opcode();
            if debug_flags::cpu_trace() {
                log::trace!(
                    "{:02X}:{:04X} op={:02X} A={:04X} X={:04X} Y={:04X} SP={:04X} DP={:04X} DB={:02X} P={:02X}",
                    pb, pc, opcode, self.a, self.x, self.y, self.sp, self.dp, self.db, self.p.bits()
                );
            }
            self.execute_instruction(opcode);
        }
    }

    // ------------------------- bus gateway -------------------------

    fn read(&mut self, addr: u32) -> u8 {
        self.bus.read_u8(addr)
    }

    fn write(&mut self, addr: u32, value: u8) {
        self.bus.write_u8(addr, value);
    }

    fn idle(&mut self) {
        self.bus.idle(false);
    }

    fn idle_wait(&mut self) {
        self.bus.idle(true);
    }

    // ------------------------- flags -------------------------

    fn mem_8bit(&self) -> bool {
        self.emulation_mode || self.p.contains(StatusFlags::MEMORY_8BIT)
    }

    fn index_8bit(&self) -> bool {
        self.emulation_mode || self.p.contains(StatusFlags::INDEX_8BIT)
    }

    fn carry(&self) -> bool {
        self.p.contains(StatusFlags::CARRY)
    }

    fn decimal(&self) -> bool {
        self.p.contains(StatusFlags::DECIMAL)
    }

    /// Writes the status byte. In emulation mode M and X read back as set
    /// regardless of the written value; an 8-bit index select truncates X
    /// and Y immediately.
    fn set_flags_byte(&mut self, value: u8) {
        self.p = StatusFlags::from_bits_truncate(value);
        if self.emulation_mode {
            self.p.insert(StatusFlags::MEMORY_8BIT | StatusFlags::INDEX_8BIT);
        }
        if self.p.contains(StatusFlags::INDEX_8BIT) {
            self.x &= 0xff;
            self.y &= 0xff;
        }
    }

    fn set_zn(&mut self, value: u16, byte: bool) {
        if byte {
            self.p.set(StatusFlags::ZERO, value & 0xff == 0);
            self.p.set(StatusFlags::NEGATIVE, value & 0x80 != 0);
        } else {
            self.p.set(StatusFlags::ZERO, value == 0);
            self.p.set(StatusFlags::NEGATIVE, value & 0x8000 != 0);
        }
    }

    // ------------------------- interrupts -------------------------

    fn check_interrupts(&mut self) {
        self.int_wanted =
            self.nmi_wanted || (self.irq_wanted && !self.p.contains(StatusFlags::IRQ_DISABLE));
    }

    fn do_interrupt(&mut self) {
        self.idle();
        if !self.emulation_mode {
            let pb = self.pb;
            self.push_u8(pb);
        }
        let pc = self.pc;
        self.push_u16(pc, false);
        // Hardware interrupts push the status byte with bit 4 clear.
        let flags = self.p.bits() & 0xef;
        self.push_u8(flags);
        self.p.insert(StatusFlags::IRQ_DISABLE);
        self.p.remove(StatusFlags::DECIMAL);
        self.pb = 0;
        self.int_wanted = false;
        let (vector_low, vector_high) = match (self.emulation_mode, self.nmi_wanted) {
            (true, true) => (0xfffa, 0xfffb),
            (true, false) => (0xfffe, 0xffff),
            (false, true) => (0xffea, 0xffeb),
            (false, false) => (0xffee, 0xffef),
        };
        if debug_flags::irq_trace() {
            log::trace!(
                "interrupt: nmi={} e={} vector={:04X}",
                self.nmi_wanted,
                self.emulation_mode,
                vector_low
            );
        }
        self.nmi_wanted = false;
        self.pc = self.read_word(vector_low, vector_high, false);
    }

    // ------------------------- opcode stream -------------------------

    fn read_opcode(&mut self) -> u8 {
        let addr = ((self.pb as u32) << 16) | self.pc as u32;
        self.pc = self.pc.wrapping_add(1);
        self.read(addr)
    }

    fn read_opcode_word(&mut self, int_check: bool) -> u16 {
        let low = self.read_opcode() as u16;
        if int_check {
            self.check_interrupts();
        }
        let high = self.read_opcode() as u16;
        low | (high << 8)
    }

    // ------------------------- stack -------------------------

    fn push_u8(&mut self, value: u8) {
        let addr = self.sp as u32;
        self.write(addr, value);
        self.sp = self.sp.wrapping_sub(1);
        if self.emulation_mode {
            self.sp = (self.sp & 0xff) | 0x100;
        }
    }

    fn pull_u8(&mut self) -> u8 {
        self.sp = self.sp.wrapping_add(1);
        if self.emulation_mode {
            self.sp = (self.sp & 0xff) | 0x100;
        }
        let addr = self.sp as u32;
        self.read(addr)
    }

    fn push_u16(&mut self, value: u16, int_check: bool) {
        self.push_u8((value >> 8) as u8);
        if int_check {
            self.check_interrupts();
        }
        self.push_u8(value as u8);
    }

    fn pull_u16(&mut self, int_check: bool) -> u16 {
        let low = self.pull_u8() as u16;
        if int_check {
            self.check_interrupts();
        }
        low | ((self.pull_u8() as u16) << 8)
    }

    // ------------------------- word access -------------------------

    fn read_word(&mut self, addr_low: u32, addr_high: u32, int_check: bool) -> u16 {
        let low = self.read(addr_low) as u16;
        if int_check {
            self.check_interrupts();
        }
        let high = self.read(addr_high) as u16;
        low | (high << 8)
    }

    /// Read-modify-write writebacks store high-then-low (`reversed`); plain
    /// stores go low-then-high.
    fn write_word(&mut self, addr_low: u32, addr_high: u32, value: u16, reversed: bool, int_check: bool) {
        if reversed {
            self.write(addr_high, (value >> 8) as u8);
            if int_check {
                self.check_interrupts();
            }
            self.write(addr_low, value as u8);
        } else {
            self.write(addr_low, value as u8);
            if int_check {
                self.check_interrupts();
            }
            self.write(addr_high, (value >> 8) as u8);
        }
    }

    fn do_branch(&mut self, condition: bool) {
        if !condition {
            self.check_interrupts();
        }
        let value = self.read_opcode();
        if condition {
            self.check_interrupts();
            self.idle();
            self.pc = self.pc.wrapping_add(value as i8 as u16);
        }
    }

    // ------------------------- addressing modes -------------------------
    //
    // Each resolver consumes post-opcode bytes and returns the pair of
    // 24-bit addresses touched by the operation; 8-bit operations only use
    // the first. Direct-page `high` wraps at 16 bits, everything else at 24.

    fn addr_implied(&mut self) {
        self.check_interrupts();
        if self.int_wanted {
            self.read(((self.pb as u32) << 16) | self.pc as u32);
        } else {
            self.idle();
        }
    }

    fn addr_immediate(&mut self, x_flag: bool) -> (u32, u32) {
        let byte = if x_flag { self.index_8bit() } else { self.mem_8bit() };
        let low = ((self.pb as u32) << 16) | self.pc as u32;
        self.pc = self.pc.wrapping_add(1);
        let mut high = 0;
        if !byte {
            high = ((self.pb as u32) << 16) | self.pc as u32;
            self.pc = self.pc.wrapping_add(1);
        }
        (low, high)
    }

    fn addr_direct(&mut self) -> (u32, u32) {
        let offset = self.read_opcode() as u16;
        if self.dp & 0xff != 0 {
            self.idle();
        }
        let low = self.dp.wrapping_add(offset) as u32;
        (low, (low + 1) & 0xffff)
    }

    fn addr_direct_x(&mut self) -> (u32, u32) {
        let offset = self.read_opcode() as u16;
        if self.dp & 0xff != 0 {
            self.idle();
        }
        self.idle();
        let low = self.dp.wrapping_add(offset).wrapping_add(self.x) as u32;
        (low, (low + 1) & 0xffff)
    }

    fn addr_direct_y(&mut self) -> (u32, u32) {
        let offset = self.read_opcode() as u16;
        if self.dp & 0xff != 0 {
            self.idle();
        }
        self.idle();
        let low = self.dp.wrapping_add(offset).wrapping_add(self.y) as u32;
        (low, (low + 1) & 0xffff)
    }

    fn addr_indirect(&mut self) -> (u32, u32) {
        let offset = self.read_opcode() as u16;
        if self.dp & 0xff != 0 {
            self.idle();
        }
        let base = self.dp.wrapping_add(offset);
        let pointer = self.read_word(base as u32, base.wrapping_add(1) as u32, false);
        let low = ((self.db as u32) << 16) + pointer as u32;
        (low, (low + 1) & 0xffffff)
    }

    fn addr_indirect_x(&mut self) -> (u32, u32) {
        let offset = self.read_opcode() as u16;
        if self.dp & 0xff != 0 {
            self.idle();
        }
        self.idle();
        let base = self.dp.wrapping_add(offset).wrapping_add(self.x);
        let pointer = self.read_word(base as u32, base.wrapping_add(1) as u32, false);
        let low = ((self.db as u32) << 16) + pointer as u32;
        (low, (low + 1) & 0xffffff)
    }

    fn addr_indirect_y(&mut self, write: bool) -> (u32, u32) {
        let offset = self.read_opcode() as u16;
        if self.dp & 0xff != 0 {
            self.idle();
        }
        let base = self.dp.wrapping_add(offset);
        let pointer = self.read_word(base as u32, base.wrapping_add(1) as u32, false);
        // Page-cross check on the 16-bit sum, before the bank is prepended.
        let crossed = (pointer as u32) >> 8 != (pointer as u32 + self.y as u32) >> 8;
        if write || !self.index_8bit() || crossed {
            self.idle();
        }
        let low = (((self.db as u32) << 16) + pointer as u32 + self.y as u32) & 0xffffff;
        (low, (low + 1) & 0xffffff)
    }

    fn addr_indirect_long(&mut self) -> (u32, u32) {
        let offset = self.read_opcode() as u16;
        if self.dp & 0xff != 0 {
            self.idle();
        }
        let base = self.dp.wrapping_add(offset);
        let mut pointer = self.read_word(base as u32, base.wrapping_add(1) as u32, false) as u32;
        pointer |= (self.read(base.wrapping_add(2) as u32) as u32) << 16;
        (pointer, (pointer + 1) & 0xffffff)
    }

    fn addr_indirect_long_y(&mut self) -> (u32, u32) {
        let offset = self.read_opcode() as u16;
        if self.dp & 0xff != 0 {
            self.idle();
        }
        let base = self.dp.wrapping_add(offset);
        let mut pointer = self.read_word(base as u32, base.wrapping_add(1) as u32, false) as u32;
        pointer |= (self.read(base.wrapping_add(2) as u32) as u32) << 16;
        let low = (pointer + self.y as u32) & 0xffffff;
        (low, (low + 1) & 0xffffff)
    }

    fn addr_stack_relative(&mut self) -> (u32, u32) {
        let offset = self.read_opcode() as u16;
        self.idle();
        let low = self.sp.wrapping_add(offset) as u32;
        (low, (low + 1) & 0xffff)
    }

    fn addr_stack_relative_indirect_y(&mut self) -> (u32, u32) {
        let offset = self.read_opcode() as u16;
        self.idle();
        let base = self.sp.wrapping_add(offset);
        let pointer = self.read_word(base as u32, base.wrapping_add(1) as u32, false);
        self.idle();
        let low = (((self.db as u32) << 16) + pointer as u32 + self.y as u32) & 0xffffff;
        (low, (low + 1) & 0xffffff)
    }

    fn addr_absolute(&mut self) -> (u32, u32) {
        let addr = self.read_opcode_word(false);
        let low = ((self.db as u32) << 16) + addr as u32;
        (low, (low + 1) & 0xffffff)
    }

    fn addr_absolute_x(&mut self, write: bool) -> (u32, u32) {
        let addr = self.read_opcode_word(false);
        let crossed = (addr as u32) >> 8 != (addr as u32 + self.x as u32) >> 8;
        if write || !self.index_8bit() || crossed {
            self.idle();
        }
        let low = (((self.db as u32) << 16) + addr as u32 + self.x as u32) & 0xffffff;
        (low, (low + 1) & 0xffffff)
    }

    fn addr_absolute_y(&mut self, write: bool) -> (u32, u32) {
        let addr = self.read_opcode_word(false);
        let crossed = (addr as u32) >> 8 != (addr as u32 + self.y as u32) >> 8;
        if write || !self.index_8bit() || crossed {
            self.idle();
        }
        let low = (((self.db as u32) << 16) + addr as u32 + self.y as u32) & 0xffffff;
        (low, (low + 1) & 0xffffff)
    }

    fn addr_absolute_long(&mut self) -> (u32, u32) {
        let mut addr = self.read_opcode_word(false) as u32;
        addr |= (self.read_opcode() as u32) << 16;
        (addr, (addr + 1) & 0xffffff)
    }

    fn addr_absolute_long_x(&mut self) -> (u32, u32) {
        let mut addr = self.read_opcode_word(false) as u32;
        addr |= (self.read_opcode() as u32) << 16;
        let low = (addr + self.x as u32) & 0xffffff;
        (low, (low + 1) & 0xffffff)
    }

    // ------------------------- operation kernels -------------------------

    fn and(&mut self, low: u32, high: u32) {
        if self.mem_8bit() {
            self.check_interrupts();
            let value = self.read(low) as u16;
            self.a = (self.a & 0xff00) | ((self.a & value) & 0xff);
        } else {
            let value = self.read_word(low, high, true);
            self.a &= value;
        }
        let byte = self.mem_8bit();
        self.set_zn(self.a, byte);
    }

    fn ora(&mut self, low: u32, high: u32) {
        if self.mem_8bit() {
            self.check_interrupts();
            let value = self.read(low) as u16;
            self.a = (self.a & 0xff00) | ((self.a | value) & 0xff);
        } else {
            let value = self.read_word(low, high, true);
            self.a |= value;
        }
        let byte = self.mem_8bit();
        self.set_zn(self.a, byte);
    }

    fn eor(&mut self, low: u32, high: u32) {
        if self.mem_8bit() {
            self.check_interrupts();
            let value = self.read(low) as u16;
            self.a = (self.a & 0xff00) | ((self.a ^ value) & 0xff);
        } else {
            let value = self.read_word(low, high, true);
            self.a ^= value;
        }
        let byte = self.mem_8bit();
        self.set_zn(self.a, byte);
    }

    fn adc(&mut self, low: u32, high: u32) {
        if self.mem_8bit() {
            self.check_interrupts();
            let value = self.read(low) as u16;
            let carry = self.carry() as u16;
            let mut result;
            if self.decimal() {
                result = (self.a & 0xf) + (value & 0xf) + carry;
                if result > 0x9 {
                    result = ((result + 0x6) & 0xf) + 0x10;
                }
                result = (self.a & 0xf0) + (value & 0xf0) + result;
            } else {
                result = (self.a & 0xff) + value + carry;
            }
            let overflow =
                (self.a ^ value) & 0x80 == 0 && (self.a ^ result) & 0x80 != 0;
            self.p.set(StatusFlags::OVERFLOW, overflow);
            if self.decimal() && result > 0x9f {
                result += 0x60;
            }
            self.p.set(StatusFlags::CARRY, result > 0xff);
            self.a = (self.a & 0xff00) | (result & 0xff);
        } else {
            let value = self.read_word(low, high, true) as u32;
            let a = self.a as u32;
            let carry = self.carry() as u32;
            let mut result;
            if self.decimal() {
                result = (a & 0xf) + (value & 0xf) + carry;
                if result > 0x9 {
                    result = ((result + 0x6) & 0xf) + 0x10;
                }
                result = (a & 0xf0) + (value & 0xf0) + result;
                if result > 0x9f {
                    result = ((result + 0x60) & 0xff) + 0x100;
                }
                result = (a & 0xf00) + (value & 0xf00) + result;
                if result > 0x9ff {
                    result = ((result + 0x600) & 0xfff) + 0x1000;
                }
                result = (a & 0xf000) + (value & 0xf000) + result;
            } else {
                result = a + value + carry;
            }
            let overflow = (a ^ value) & 0x8000 == 0 && (a ^ result) & 0x8000 != 0;
            self.p.set(StatusFlags::OVERFLOW, overflow);
            if self.decimal() && result > 0x9fff {
                result += 0x6000;
            }
            self.p.set(StatusFlags::CARRY, result > 0xffff);
            self.a = result as u16;
        }
        let byte = self.mem_8bit();
        self.set_zn(self.a, byte);
    }

    fn sbc(&mut self, low: u32, high: u32) {
        if self.mem_8bit() {
            self.check_interrupts();
            let operand = self.read(low) as u16;
            let a = self.a & 0xff;
            let borrow = 1 - self.carry() as u16;
            let mut result = a.wrapping_sub(operand).wrapping_sub(borrow);
            let overflow = (a ^ operand) & (a ^ result) & 0x80 != 0;
            self.p.set(StatusFlags::OVERFLOW, overflow);
            if self.decimal() {
                let mut temp = (a & 0x0f).wrapping_sub(operand & 0x0f).wrapping_sub(borrow);
                if temp & 0x10 != 0 {
                    temp = temp.wrapping_sub(0x6);
                }
                temp = (a & 0xf0).wrapping_sub(operand & 0xf0).wrapping_add(temp);
                if temp & 0x100 != 0 {
                    temp = temp.wrapping_sub(0x60);
                }
                result = temp;
            }
            self.p.set(StatusFlags::CARRY, result & 0xff00 == 0);
            self.a = (self.a & 0xff00) | (result & 0xff);
        } else {
            let operand = self.read_word(low, high, true) as u32;
            let a = self.a as u32;
            let borrow = 1 - self.carry() as u32;
            let mut result = a.wrapping_sub(operand).wrapping_sub(borrow);
            let overflow = (a ^ operand) & (a ^ result) & 0x8000 != 0;
            self.p.set(StatusFlags::OVERFLOW, overflow);
            if self.decimal() {
                let mut temp = (a & 0x000f).wrapping_sub(operand & 0x000f).wrapping_sub(borrow);
                if temp & 0x10 != 0 {
                    temp = temp.wrapping_sub(0x6);
                }
                temp = (a & 0x00f0).wrapping_sub(operand & 0x00f0).wrapping_add(temp);
                if temp & 0x100 != 0 {
                    temp = temp.wrapping_sub(0x60);
                }
                temp = (a & 0x0f00).wrapping_sub(operand & 0x0f00).wrapping_add(temp);
                if temp & 0x1000 != 0 {
                    temp = temp.wrapping_sub(0x600);
                }
                temp = (a & 0xf000).wrapping_sub(operand & 0xf000).wrapping_add(temp);
                if temp & 0x10000 != 0 {
                    temp = temp.wrapping_sub(0x6000);
                }
                result = temp;
            }
            self.p.set(StatusFlags::CARRY, result & 0xffff_0000 == 0);
            self.a = result as u16;
        }
        let byte = self.mem_8bit();
        self.set_zn(self.a, byte);
    }

    fn cmp(&mut self, low: u32, high: u32) {
        let result;
        if self.mem_8bit() {
            self.check_interrupts();
            let value = self.read(low) as u32;
            result = (self.a as u32 & 0xff).wrapping_sub(value);
            self.p.set(StatusFlags::CARRY, result < 0x100);
        } else {
            let value = self.read_word(low, high, true) as u32;
            result = (self.a as u32).wrapping_sub(value);
            self.p.set(StatusFlags::CARRY, result < 0x10000);
        }
        let byte = self.mem_8bit();
        self.set_zn(result as u16, byte);
    }

    fn cpx(&mut self, low: u32, high: u32) {
        let result;
        if self.index_8bit() {
            self.check_interrupts();
            let value = self.read(low) as u32;
            result = (self.x as u32 & 0xff).wrapping_sub(value);
            self.p.set(StatusFlags::CARRY, result < 0x100);
        } else {
            let value = self.read_word(low, high, true) as u32;
            result = (self.x as u32).wrapping_sub(value);
            self.p.set(StatusFlags::CARRY, result < 0x10000);
        }
        let byte = self.index_8bit();
        self.set_zn(result as u16, byte);
    }

    fn cpy(&mut self, low: u32, high: u32) {
        let result;
        if self.index_8bit() {
            self.check_interrupts();
            let value = self.read(low) as u32;
            result = (self.y as u32 & 0xff).wrapping_sub(value);
            self.p.set(StatusFlags::CARRY, result < 0x100);
        } else {
            let value = self.read_word(low, high, true) as u32;
            result = (self.y as u32).wrapping_sub(value);
            self.p.set(StatusFlags::CARRY, result < 0x10000);
        }
        let byte = self.index_8bit();
        self.set_zn(result as u16, byte);
    }

    /// Memory BIT. The immediate form (0x89) is handled in dispatch and
    /// only touches Z.
    fn bit(&mut self, low: u32, high: u32) {
        if self.mem_8bit() {
            self.check_interrupts();
            let value = self.read(low) as u16;
            self.p.set(StatusFlags::ZERO, (self.a & 0xff) & value == 0);
            self.p.set(StatusFlags::NEGATIVE, value & 0x80 != 0);
            self.p.set(StatusFlags::OVERFLOW, value & 0x40 != 0);
        } else {
            let value = self.read_word(low, high, true);
            self.p.set(StatusFlags::ZERO, self.a & value == 0);
            self.p.set(StatusFlags::NEGATIVE, value & 0x8000 != 0);
            self.p.set(StatusFlags::OVERFLOW, value & 0x4000 != 0);
        }
    }

    fn lda(&mut self, low: u32, high: u32) {
        if self.mem_8bit() {
            self.check_interrupts();
            let value = self.read(low) as u16;
            self.a = (self.a & 0xff00) | value;
        } else {
            self.a = self.read_word(low, high, true);
        }
        let byte = self.mem_8bit();
        self.set_zn(self.a, byte);
    }

    fn ldx(&mut self, low: u32, high: u32) {
        if self.index_8bit() {
            self.check_interrupts();
            self.x = self.read(low) as u16;
        } else {
            self.x = self.read_word(low, high, true);
        }
        let byte = self.index_8bit();
        self.set_zn(self.x, byte);
    }

    fn ldy(&mut self, low: u32, high: u32) {
        if self.index_8bit() {
            self.check_interrupts();
            self.y = self.read(low) as u16;
        } else {
            self.y = self.read_word(low, high, true);
        }
        let byte = self.index_8bit();
        self.set_zn(self.y, byte);
    }

    fn sta(&mut self, low: u32, high: u32) {
        if self.mem_8bit() {
            self.check_interrupts();
            let value = self.a as u8;
            self.write(low, value);
        } else {
            let value = self.a;
            self.write_word(low, high, value, false, true);
        }
    }

    fn stx(&mut self, low: u32, high: u32) {
        if self.index_8bit() {
            self.check_interrupts();
            let value = self.x as u8;
            self.write(low, value);
        } else {
            let value = self.x;
            self.write_word(low, high, value, false, true);
        }
    }

    fn sty(&mut self, low: u32, high: u32) {
        if self.index_8bit() {
            self.check_interrupts();
            let value = self.y as u8;
            self.write(low, value);
        } else {
            let value = self.y;
            self.write_word(low, high, value, false, true);
        }
    }

    fn stz(&mut self, low: u32, high: u32) {
        if self.mem_8bit() {
            self.check_interrupts();
            self.write(low, 0);
        } else {
            self.write_word(low, high, 0, false, true);
        }
    }

    fn asl(&mut self, low: u32, high: u32) {
        let result;
        if self.mem_8bit() {
            result = (self.read(low) as u32) << 1;
            self.idle();
            self.p.set(StatusFlags::CARRY, result & 0x100 != 0);
            self.check_interrupts();
            self.write(low, result as u8);
        } else {
            result = (self.read_word(low, high, false) as u32) << 1;
            self.idle();
            self.p.set(StatusFlags::CARRY, result & 0x10000 != 0);
            self.write_word(low, high, result as u16, true, true);
        }
        let byte = self.mem_8bit();
        self.set_zn(result as u16, byte);
    }

    fn lsr(&mut self, low: u32, high: u32) {
        let result;
        if self.mem_8bit() {
            let value = self.read(low);
            self.idle();
            self.p.set(StatusFlags::CARRY, value & 1 != 0);
            result = (value >> 1) as u16;
            self.check_interrupts();
            self.write(low, result as u8);
        } else {
            let value = self.read_word(low, high, false);
            self.idle();
            self.p.set(StatusFlags::CARRY, value & 1 != 0);
            result = value >> 1;
            self.write_word(low, high, result, true, true);
        }
        let byte = self.mem_8bit();
        self.set_zn(result, byte);
    }

    fn rol(&mut self, low: u32, high: u32) {
        let result;
        if self.mem_8bit() {
            result = ((self.read(low) as u32) << 1) | self.carry() as u32;
            self.idle();
            self.p.set(StatusFlags::CARRY, result & 0x100 != 0);
            self.check_interrupts();
            self.write(low, result as u8);
        } else {
            result = ((self.read_word(low, high, false) as u32) << 1) | self.carry() as u32;
            self.idle();
            self.p.set(StatusFlags::CARRY, result & 0x10000 != 0);
            self.write_word(low, high, result as u16, true, true);
        }
        let byte = self.mem_8bit();
        self.set_zn(result as u16, byte);
    }

    fn ror(&mut self, low: u32, high: u32) {
        let carry;
        let result;
        if self.mem_8bit() {
            let value = self.read(low);
            self.idle();
            carry = value & 1 != 0;
            result = ((value >> 1) as u16) | ((self.carry() as u16) << 7);
            self.check_interrupts();
            self.write(low, result as u8);
        } else {
            let value = self.read_word(low, high, false);
            self.idle();
            carry = value & 1 != 0;
            result = (value >> 1) | ((self.carry() as u16) << 15);
            self.write_word(low, high, result, true, true);
        }
        let byte = self.mem_8bit();
        self.set_zn(result, byte);
        self.p.set(StatusFlags::CARRY, carry);
    }

    fn inc(&mut self, low: u32, high: u32) {
        let result;
        if self.mem_8bit() {
            result = (self.read(low) as u16).wrapping_add(1);
            self.idle();
            self.check_interrupts();
            self.write(low, result as u8);
        } else {
            result = self.read_word(low, high, false).wrapping_add(1);
            self.idle();
            self.write_word(low, high, result, true, true);
        }
        let byte = self.mem_8bit();
        self.set_zn(result, byte);
    }

    fn dec(&mut self, low: u32, high: u32) {
        let result;
        if self.mem_8bit() {
            result = (self.read(low) as u16).wrapping_sub(1);
            self.idle();
            self.check_interrupts();
            self.write(low, result as u8);
        } else {
            result = self.read_word(low, high, false).wrapping_sub(1);
            self.idle();
            self.write_word(low, high, result, true, true);
        }
        let byte = self.mem_8bit();
        self.set_zn(result, byte);
    }

    fn tsb(&mut self, low: u32, high: u32) {
        if self.mem_8bit() {
            let value = self.read(low);
            self.idle();
            self.p.set(StatusFlags::ZERO, (self.a as u8) & value == 0);
            self.check_interrupts();
            let result = value | self.a as u8;
            self.write(low, result);
        } else {
            let value = self.read_word(low, high, false);
            self.idle();
            self.p.set(StatusFlags::ZERO, self.a & value == 0);
            let result = value | self.a;
            self.write_word(low, high, result, true, true);
        }
    }

    fn trb(&mut self, low: u32, high: u32) {
        if self.mem_8bit() {
            let value = self.read(low);
            self.idle();
            self.p.set(StatusFlags::ZERO, (self.a as u8) & value == 0);
            self.check_interrupts();
            let result = value & !(self.a as u8);
            self.write(low, result);
        } else {
            let value = self.read_word(low, high, false);
            self.idle();
            self.p.set(StatusFlags::ZERO, self.a & value == 0);
            let result = value & !self.a;
            self.write_word(low, high, result, true, true);
        }
    }

    // ------------------------- dispatch -------------------------

    fn execute_instruction(&mut self, opcode: u8) {
        match opcode {
            0x00 => {
                // BRK: signature byte, then trap with bit 4 set in the
                // pushed status byte.
                self.read_opcode();
                if !self.emulation_mode {
                    let pb = self.pb;
                    self.push_u8(pb);
                }
                let pc = self.pc;
                self.push_u16(pc, false);
                let flags = self.p.bits() | 0x10;
                self.push_u8(flags);
                self.p.insert(StatusFlags::IRQ_DISABLE);
                self.p.remove(StatusFlags::DECIMAL);
                self.pb = 0;
                let vector: u32 = if self.emulation_mode { 0xfffe } else { 0xffe6 };
                self.pc = self.read_word(vector, vector + 1, true);
            }
            0x01 => {
                let (low, high) = self.addr_indirect_x();
                self.ora(low, high);
            }
            0x02 => {
                // COP: like BRK, but the status byte is pushed unchanged.
                self.read_opcode();
                if !self.emulation_mode {
                    let pb = self.pb;
                    self.push_u8(pb);
                }
                let pc = self.pc;
                self.push_u16(pc, false);
                let flags = self.p.bits();
                self.push_u8(flags);
                self.p.insert(StatusFlags::IRQ_DISABLE);
                self.p.remove(StatusFlags::DECIMAL);
                self.pb = 0;
                let vector: u32 = if self.emulation_mode { 0xfff4 } else { 0xffe4 };
                self.pc = self.read_word(vector, vector + 1, true);
            }
            0x03 => {
                let (low, high) = self.addr_stack_relative();
                self.ora(low, high);
            }
            0x04 => {
                let (low, high) = self.addr_direct();
                self.tsb(low, high);
            }
            0x05 => {
                let (low, high) = self.addr_direct();
                self.ora(low, high);
            }
            0x06 => {
                let (low, high) = self.addr_direct();
                self.asl(low, high);
            }
            0x07 => {
                let (low, high) = self.addr_indirect_long();
                self.ora(low, high);
            }
            0x08 => {
                // PHP
                self.addr_implied();
                let flags = self.p.bits();
                self.push_u8(flags);
            }
            0x09 => {
                let (low, high) = self.addr_immediate(false);
                self.ora(low, high);
            }
            0x0a => {
                // ASL A
                self.addr_implied();
                if self.mem_8bit() {
                    self.p.set(StatusFlags::CARRY, self.a & 0x80 != 0);
                    self.a = (self.a & 0xff00) | ((self.a << 1) & 0xff);
                } else {
                    self.p.set(StatusFlags::CARRY, self.a & 0x8000 != 0);
                    self.a <<= 1;
                }
                let byte = self.mem_8bit();
                self.set_zn(self.a, byte);
            }
            0x0b => {
                // PHD
                self.addr_implied();
                let dp = self.dp;
                self.push_u16(dp, true);
            }
            0x0c => {
                let (low, high) = self.addr_absolute();
                self.tsb(low, high);
            }
            0x0d => {
                let (low, high) = self.addr_absolute();
                self.ora(low, high);
            }
            0x0e => {
                let (low, high) = self.addr_absolute();
                self.asl(low, high);
            }
            0x0f => {
                let (low, high) = self.addr_absolute_long();
                self.ora(low, high);
            }
            0x10 => {
                // BPL
                let condition = !self.p.contains(StatusFlags::NEGATIVE);
                self.do_branch(condition);
            }
            0x11 => {
                let (low, high) = self.addr_indirect_y(false);
                self.ora(low, high);
            }
            0x12 => {
                let (low, high) = self.addr_indirect();
                self.ora(low, high);
            }
            0x13 => {
                let (low, high) = self.addr_stack_relative_indirect_y();
                self.ora(low, high);
            }
            0x14 => {
                let (low, high) = self.addr_direct();
                self.trb(low, high);
            }
            0x15 => {
                let (low, high) = self.addr_direct_x();
                self.ora(low, high);
            }
            0x16 => {
                let (low, high) = self.addr_direct_x();
                self.asl(low, high);
            }
            0x17 => {
                let (low, high) = self.addr_indirect_long_y();
                self.ora(low, high);
            }
            0x18 => {
                // CLC
                self.addr_implied();
                self.p.remove(StatusFlags::CARRY);
            }
            0x19 => {
                let (low, high) = self.addr_absolute_y(false);
                self.ora(low, high);
            }
            0x1a => {
                // INC A
                self.addr_implied();
                if self.mem_8bit() {
                    self.a = (self.a & 0xff00) | (self.a.wrapping_add(1) & 0xff);
                } else {
                    self.a = self.a.wrapping_add(1);
                }
                let byte = self.mem_8bit();
                self.set_zn(self.a, byte);
            }
            0x1b => {
                // TCS
                self.addr_implied();
                self.sp = self.a;
                if self.emulation_mode {
                    self.sp = (self.sp & 0xff) | 0x100;
                }
            }
            0x1c => {
                let (low, high) = self.addr_absolute();
                self.trb(low, high);
            }
            0x1d => {
                let (low, high) = self.addr_absolute_x(false);
                self.ora(low, high);
            }
            0x1e => {
                let (low, high) = self.addr_absolute_x(true);
                self.asl(low, high);
            }
            0x1f => {
                let (low, high) = self.addr_absolute_long_x();
                self.ora(low, high);
            }
            0x20 => {
                // JSR abs
                let target = self.read_opcode_word(false);
                self.idle();
                let ret = self.pc.wrapping_sub(1);
                self.push_u16(ret, true);
                self.pc = target;
            }
            0x21 => {
                let (low, high) = self.addr_indirect_x();
                self.and(low, high);
            }
            0x22 => {
                // JSL
                let mut target = self.read_opcode_word(false) as u32;
                target |= (self.read_opcode() as u32) << 16;
                let ret = self.pc.wrapping_sub(1);
                self.push_u16(ret, true);
                self.pb = (target >> 16) as u8;
                self.pc = target as u16;
            }
            0x23 => {
                let (low, high) = self.addr_stack_relative();
                self.and(low, high);
            }
            0x24 => {
                let (low, high) = self.addr_direct();
                self.bit(low, high);
            }
            0x25 => {
                let (low, high) = self.addr_direct();
                self.and(low, high);
            }
            0x26 => {
                let (low, high) = self.addr_direct();
                self.rol(low, high);
            }
            0x27 => {
                let (low, high) = self.addr_indirect_long();
                self.and(low, high);
            }
            0x28 => {
                // PLP
                self.addr_implied();
                self.idle();
                let flags = self.pull_u8();
                self.set_flags_byte(flags);
            }
            0x29 => {
                let (low, high) = self.addr_immediate(false);
                self.and(low, high);
            }
            0x2a => {
                // ROL A
                self.addr_implied();
                let result = ((self.a as u32) << 1) | self.carry() as u32;
                if self.mem_8bit() {
                    self.p.set(StatusFlags::CARRY, result & 0x100 != 0);
                    self.a = (self.a & 0xff00) | (result as u16 & 0xff);
                } else {
                    self.p.set(StatusFlags::CARRY, result & 0x10000 != 0);
                    self.a = result as u16;
                }
                let byte = self.mem_8bit();
                self.set_zn(self.a, byte);
            }
            0x2b => {
                // PLD
                self.addr_implied();
                self.idle();
                self.dp = self.pull_u16(true);
                let dp = self.dp;
                self.set_zn(dp, false);
            }
            0x2c => {
                let (low, high) = self.addr_absolute();
                self.bit(low, high);
            }
            0x2d => {
                let (low, high) = self.addr_absolute();
                self.and(low, high);
            }
            0x2e => {
                let (low, high) = self.addr_absolute();
                self.rol(low, high);
            }
            0x2f => {
                let (low, high) = self.addr_absolute_long();
                self.and(low, high);
            }
            0x30 => {
                // BMI
                let condition = self.p.contains(StatusFlags::NEGATIVE);
                self.do_branch(condition);
            }
            0x31 => {
                let (low, high) = self.addr_indirect_y(false);
                self.and(low, high);
            }
            0x32 => {
                let (low, high) = self.addr_indirect();
                self.and(low, high);
            }
            0x33 => {
                let (low, high) = self.addr_stack_relative_indirect_y();
                self.and(low, high);
            }
            0x34 => {
                let (low, high) = self.addr_direct_x();
                self.bit(low, high);
            }
            0x35 => {
                let (low, high) = self.addr_direct_x();
                self.and(low, high);
            }
            0x36 => {
                let (low, high) = self.addr_direct_x();
                self.rol(low, high);
            }
            0x37 => {
                let (low, high) = self.addr_indirect_long_y();
                self.and(low, high);
            }
            0x38 => {
                // SEC
                self.addr_implied();
                self.p.insert(StatusFlags::CARRY);
            }
            0x39 => {
                let (low, high) = self.addr_absolute_y(false);
                self.and(low, high);
            }
            0x3a => {
                // DEC A
                self.addr_implied();
                if self.mem_8bit() {
                    self.a = (self.a & 0xff00) | (self.a.wrapping_sub(1) & 0xff);
                } else {
                    self.a = self.a.wrapping_sub(1);
                }
                let byte = self.mem_8bit();
                self.set_zn(self.a, byte);
            }
            0x3b => {
                // TSC
                self.addr_implied();
                self.a = self.sp;
                let a = self.a;
                self.set_zn(a, false);
            }
            0x3c => {
                let (low, high) = self.addr_absolute_x(false);
                self.bit(low, high);
            }
            0x3d => {
                let (low, high) = self.addr_absolute_x(false);
                self.and(low, high);
            }
            0x3e => {
                let (low, high) = self.addr_absolute_x(true);
                self.rol(low, high);
            }
            0x3f => {
                let (low, high) = self.addr_absolute_long_x();
                self.and(low, high);
            }
            0x40 => {
                // RTI
                self.addr_implied();
                self.idle();
                let flags = self.pull_u8();
                self.set_flags_byte(flags);
                self.pc = self.pull_u16(false);
                if !self.emulation_mode {
                    self.pb = self.pull_u8();
                }
            }
            0x41 => {
                let (low, high) = self.addr_indirect_x();
                self.eor(low, high);
            }
            0x42 => {
                // WDM: one operand byte, no effect.
                self.read_opcode();
            }
            0x43 => {
                let (low, high) = self.addr_stack_relative();
                self.eor(low, high);
            }
            0x44 => {
                // MVP: one byte per step, X/Y post-decremented, PC rewound
                // until A underflows past zero.
                let dest = self.read_opcode();
                let src = self.read_opcode();
                self.db = dest;
                let value = self.read(((src as u32) << 16) | self.x as u32);
                self.write(((dest as u32) << 16) | self.y as u32, value);
                self.a = self.a.wrapping_sub(1);
                self.x = self.x.wrapping_sub(1);
                self.y = self.y.wrapping_sub(1);
                if self.a != 0xffff {
                    self.pc = self.pc.wrapping_sub(3);
                }
                if self.index_8bit() {
                    self.x &= 0xff;
                    self.y &= 0xff;
                }
                self.idle();
                self.check_interrupts();
                self.idle();
            }
            0x45 => {
                let (low, high) = self.addr_direct();
                self.eor(low, high);
            }
            0x46 => {
                let (low, high) = self.addr_direct();
                self.lsr(low, high);
            }
            0x47 => {
                let (low, high) = self.addr_indirect_long();
                self.eor(low, high);
            }
            0x48 => {
                // PHA
                self.addr_implied();
                if self.mem_8bit() {
                    let value = self.a as u8;
                    self.push_u8(value);
                } else {
                    let value = self.a;
                    self.push_u16(value, true);
                }
            }
            0x49 => {
                let (low, high) = self.addr_immediate(false);
                self.eor(low, high);
            }
            0x4a => {
                // LSR A
                self.addr_implied();
                self.p.set(StatusFlags::CARRY, self.a & 1 != 0);
                if self.mem_8bit() {
                    self.a = (self.a & 0xff00) | ((self.a >> 1) & 0x7f);
                } else {
                    self.a >>= 1;
                }
                let byte = self.mem_8bit();
                self.set_zn(self.a, byte);
            }
            0x4b => {
                // PHK
                self.addr_implied();
                let pb = self.pb;
                self.push_u8(pb);
            }
            0x4c => {
                // JMP abs
                self.pc = self.read_opcode_word(true);
            }
            0x4d => {
                let (low, high) = self.addr_absolute();
                self.eor(low, high);
            }
            0x4e => {
                let (low, high) = self.addr_absolute();
                self.lsr(low, high);
            }
            0x4f => {
                let (low, high) = self.addr_absolute_long();
                self.eor(low, high);
            }
            0x50 => {
                // BVC
                let condition = !self.p.contains(StatusFlags::OVERFLOW);
                self.do_branch(condition);
            }
            0x51 => {
                let (low, high) = self.addr_indirect_y(false);
                self.eor(low, high);
            }
            0x52 => {
                let (low, high) = self.addr_indirect();
                self.eor(low, high);
            }
            0x53 => {
                let (low, high) = self.addr_stack_relative_indirect_y();
                self.eor(low, high);
            }
            0x54 => {
                // MVN: one byte per step, X/Y post-incremented.
                let dest = self.read_opcode();
                let src = self.read_opcode();
                self.db = dest;
                let value = self.read(((src as u32) << 16) | self.x as u32);
                self.write(((dest as u32) << 16) | self.y as u32, value);
                self.a = self.a.wrapping_sub(1);
                self.x = self.x.wrapping_add(1);
                self.y = self.y.wrapping_add(1);
                if self.a != 0xffff {
                    self.pc = self.pc.wrapping_sub(3);
                }
                if self.index_8bit() {
                    self.x &= 0xff;
                    self.y &= 0xff;
                }
                self.idle();
                self.check_interrupts();
                self.idle();
            }
            0x55 => {
                let (low, high) = self.addr_direct_x();
                self.eor(low, high);
            }
            0x56 => {
                let (low, high) = self.addr_direct_x();
                self.lsr(low, high);
            }
            0x57 => {
                let (low, high) = self.addr_indirect_long_y();
                self.eor(low, high);
            }
            0x58 => {
                // CLI
                self.addr_implied();
                self.p.remove(StatusFlags::IRQ_DISABLE);
            }
            0x59 => {
                let (low, high) = self.addr_absolute_y(false);
                self.eor(low, high);
            }
            0x5a => {
                // PHY
                self.addr_implied();
                if self.index_8bit() {
                    let value = self.y as u8;
                    self.push_u8(value);
                } else {
                    let value = self.y;
                    self.push_u16(value, true);
                }
            }
            0x5b => {
                // TCD
                self.addr_implied();
                self.dp = self.a;
                let dp = self.dp;
                self.set_zn(dp, false);
            }
            0x5c => {
                // JML abs long
                let target = self.read_opcode_word(false);
                self.check_interrupts();
                self.pb = self.read_opcode();
                self.pc = target;
            }
            0x5d => {
                let (low, high) = self.addr_absolute_x(false);
                self.eor(low, high);
            }
            0x5e => {
                let (low, high) = self.addr_absolute_x(true);
                self.lsr(low, high);
            }
            0x5f => {
                let (low, high) = self.addr_absolute_long_x();
                self.eor(low, high);
            }
            0x60 => {
                // RTS
                self.idle();
                self.idle();
                self.pc = self.pull_u16(false).wrapping_add(1);
                self.check_interrupts();
                self.idle();
            }
            0x61 => {
                let (low, high) = self.addr_indirect_x();
                self.adc(low, high);
            }
            0x62 => {
                // PER
                let displacement = self.read_opcode_word(false);
                self.idle();
                let value = self.pc.wrapping_add(displacement);
                self.push_u16(value, true);
            }
            0x63 => {
                let (low, high) = self.addr_stack_relative();
                self.adc(low, high);
            }
            0x64 => {
                let (low, high) = self.addr_direct();
                self.stz(low, high);
            }
            0x65 => {
                let (low, high) = self.addr_direct();
                self.adc(low, high);
            }
            0x66 => {
                let (low, high) = self.addr_direct();
                self.ror(low, high);
            }
            0x67 => {
                let (low, high) = self.addr_indirect_long();
                self.adc(low, high);
            }
            0x68 => {
                // PLA
                self.addr_implied();
                self.idle();
                if self.mem_8bit() {
                    let value = self.pull_u8() as u16;
                    self.a = (self.a & 0xff00) | value;
                } else {
                    self.a = self.pull_u16(true);
                }
                let byte = self.mem_8bit();
                self.set_zn(self.a, byte);
            }
            0x69 => {
                let (low, high) = self.addr_immediate(false);
                self.adc(low, high);
            }
            0x6a => {
                // ROR A
                self.addr_implied();
                let carry = self.a & 1 != 0;
                if self.mem_8bit() {
                    self.a =
                        (self.a & 0xff00) | ((self.a >> 1) & 0x7f) | ((self.carry() as u16) << 7);
                } else {
                    self.a = (self.a >> 1) | ((self.carry() as u16) << 15);
                }
                self.p.set(StatusFlags::CARRY, carry);
                let byte = self.mem_8bit();
                self.set_zn(self.a, byte);
            }
            0x6b => {
                // RTL
                self.idle();
                self.idle();
                self.pc = self.pull_u16(false).wrapping_add(1);
                self.check_interrupts();
                self.pb = self.pull_u8();
            }
            0x6c => {
                // JMP (abs): pointer in bank 0, high byte wraps within the
                // page in emulation mode.
                let addr = self.read_opcode_word(false);
                let addr_high = if self.emulation_mode && addr & 0xff == 0xff {
                    addr & 0xff00
                } else {
                    addr.wrapping_add(1)
                };
                self.pc = self.read_word(addr as u32, addr_high as u32, true);
            }
            0x6d => {
                let (low, high) = self.addr_absolute();
                self.adc(low, high);
            }
            0x6e => {
                let (low, high) = self.addr_absolute();
                self.ror(low, high);
            }
            0x6f => {
                let (low, high) = self.addr_absolute_long();
                self.adc(low, high);
            }
            0x70 => {
                // BVS
                let condition = self.p.contains(StatusFlags::OVERFLOW);
                self.do_branch(condition);
            }
            0x71 => {
                let (low, high) = self.addr_indirect_y(false);
                self.adc(low, high);
            }
            0x72 => {
                let (low, high) = self.addr_indirect();
                self.adc(low, high);
            }
            0x73 => {
                let (low, high) = self.addr_stack_relative_indirect_y();
                self.adc(low, high);
            }
            0x74 => {
                let (low, high) = self.addr_direct_x();
                self.stz(low, high);
            }
            0x75 => {
                let (low, high) = self.addr_direct_x();
                self.adc(low, high);
            }
            0x76 => {
                let (low, high) = self.addr_direct_x();
                self.ror(low, high);
            }
            0x77 => {
                let (low, high) = self.addr_indirect_long_y();
                self.adc(low, high);
            }
            0x78 => {
                // SEI
                self.addr_implied();
                self.p.insert(StatusFlags::IRQ_DISABLE);
            }
            0x79 => {
                let (low, high) = self.addr_absolute_y(false);
                self.adc(low, high);
            }
            0x7a => {
                // PLY
                self.addr_implied();
                self.idle();
                if self.index_8bit() {
                    self.y = self.pull_u8() as u16;
                } else {
                    self.y = self.pull_u16(true);
                }
                let byte = self.index_8bit();
                self.set_zn(self.y, byte);
            }
            0x7b => {
                // TDC
                self.addr_implied();
                self.a = self.dp;
                let a = self.a;
                self.set_zn(a, false);
            }
            0x7c => {
                // JMP (abs,X): pointer read from the program bank.
                let addr = self.read_opcode_word(false);
                self.idle();
                let base = ((self.pb as u32) << 16) | addr as u32;
                let x = self.x as u32;
                self.pc = self.read_word(base + x, base + x + 1, true);
            }
            0x7d => {
                let (low, high) = self.addr_absolute_x(false);
                self.adc(low, high);
            }
            0x7e => {
                let (low, high) = self.addr_absolute_x(true);
                self.ror(low, high);
            }
            0x7f => {
                let (low, high) = self.addr_absolute_long_x();
                self.adc(low, high);
            }
            0x80 => {
                // BRA
                self.do_branch(true);
            }
            0x81 => {
                let (low, high) = self.addr_indirect_x();
                self.sta(low, high);
            }
            0x82 => {
                // BRL
                let displacement = self.read_opcode_word(false);
                self.pc = self.pc.wrapping_add(displacement);
                self.check_interrupts();
                self.idle();
            }
            0x83 => {
                let (low, high) = self.addr_stack_relative();
                self.sta(low, high);
            }
            0x84 => {
                let (low, high) = self.addr_direct();
                self.sty(low, high);
            }
            0x85 => {
                let (low, high) = self.addr_direct();
                self.sta(low, high);
            }
            0x86 => {
                let (low, high) = self.addr_direct();
                self.stx(low, high);
            }
            0x87 => {
                let (low, high) = self.addr_indirect_long();
                self.sta(low, high);
            }
            0x88 => {
                // DEY
                self.addr_implied();
                if self.index_8bit() {
                    self.y = self.y.wrapping_sub(1) & 0xff;
                } else {
                    self.y = self.y.wrapping_sub(1);
                }
                let byte = self.index_8bit();
                self.set_zn(self.y, byte);
            }
            0x89 => {
                // BIT immediate only touches Z.
                if self.mem_8bit() {
                    self.check_interrupts();
                    let value = self.read_opcode() as u16;
                    self.p.set(StatusFlags::ZERO, (self.a & 0xff) & value == 0);
                } else {
                    let value = self.read_opcode_word(true);
                    self.p.set(StatusFlags::ZERO, self.a & value == 0);
                }
            }
            0x8a => {
                // TXA
                self.addr_implied();
                if self.mem_8bit() {
                    self.a = (self.a & 0xff00) | (self.x & 0xff);
                } else {
                    self.a = self.x;
                }
                let byte = self.mem_8bit();
                self.set_zn(self.a, byte);
            }
            0x8b => {
                // PHB
                self.addr_implied();
                let db = self.db;
                self.push_u8(db);
            }
            0x8c => {
                let (low, high) = self.addr_absolute();
                self.sty(low, high);
            }
            0x8d => {
                let (low, high) = self.addr_absolute();
                self.sta(low, high);
            }
            0x8e => {
                let (low, high) = self.addr_absolute();
                self.stx(low, high);
            }
            0x8f => {
                let (low, high) = self.addr_absolute_long();
                self.sta(low, high);
            }
            0x90 => {
                // BCC
                let condition = !self.p.contains(StatusFlags::CARRY);
                self.do_branch(condition);
            }
            0x91 => {
                let (low, high) = self.addr_indirect_y(true);
                self.sta(low, high);
            }
            0x92 => {
                let (low, high) = self.addr_indirect();
                self.sta(low, high);
            }
            0x93 => {
                let (low, high) = self.addr_stack_relative_indirect_y();
                self.sta(low, high);
            }
            0x94 => {
                let (low, high) = self.addr_direct_x();
                self.sty(low, high);
            }
            0x95 => {
                let (low, high) = self.addr_direct_x();
                self.sta(low, high);
            }
            0x96 => {
                let (low, high) = self.addr_direct_y();
                self.stx(low, high);
            }
            0x97 => {
                let (low, high) = self.addr_indirect_long_y();
                self.sta(low, high);
            }
            0x98 => {
                // TYA
                self.addr_implied();
                if self.mem_8bit() {
                    self.a = (self.a & 0xff00) | (self.y & 0xff);
                } else {
                    self.a = self.y;
                }
                let byte = self.mem_8bit();
                self.set_zn(self.a, byte);
            }
            0x99 => {
                let (low, high) = self.addr_absolute_y(true);
                self.sta(low, high);
            }
            0x9a => {
                // TXS: no flags; emulation mode only replaces the low byte.
                self.addr_implied();
                self.sp = if self.emulation_mode {
                    (self.sp & 0xff00) | (self.x & 0xff)
                } else {
                    self.x
                };
            }
            0x9b => {
                // TXY
                self.addr_implied();
                if self.index_8bit() {
                    self.y = self.x & 0xff;
                } else {
                    self.y = self.x;
                }
                let byte = self.index_8bit();
                self.set_zn(self.y, byte);
            }
            0x9c => {
                let (low, high) = self.addr_absolute();
                self.stz(low, high);
            }
            0x9d => {
                let (low, high) = self.addr_absolute_x(true);
                self.sta(low, high);
            }
            0x9e => {
                let (low, high) = self.addr_absolute_x(true);
                self.stz(low, high);
            }
            0x9f => {
                let (low, high) = self.addr_absolute_long_x();
                self.sta(low, high);
            }
            0xa0 => {
                let (low, high) = self.addr_immediate(true);
                self.ldy(low, high);
            }
            0xa1 => {
                let (low, high) = self.addr_indirect_x();
                self.lda(low, high);
            }
            0xa2 => {
                let (low, high) = self.addr_immediate(true);
                self.ldx(low, high);
            }
            0xa3 => {
                let (low, high) = self.addr_stack_relative();
                self.lda(low, high);
            }
            0xa4 => {
                let (low, high) = self.addr_direct();
                self.ldy(low, high);
            }
            0xa5 => {
                let (low, high) = self.addr_direct();
                self.lda(low, high);
            }
            0xa6 => {
                let (low, high) = self.addr_direct();
                self.ldx(low, high);
            }
            0xa7 => {
                let (low, high) = self.addr_indirect_long();
                self.lda(low, high);
            }
            0xa8 => {
                // TAY
                self.addr_implied();
                if self.index_8bit() {
                    self.y = self.a & 0xff;
                } else {
                    self.y = self.a;
                }
                let byte = self.index_8bit();
                self.set_zn(self.y, byte);
            }
            0xa9 => {
                let (low, high) = self.addr_immediate(false);
                self.lda(low, high);
            }
            0xaa => {
                // TAX
                self.addr_implied();
                if self.index_8bit() {
                    self.x = self.a & 0xff;
                } else {
                    self.x = self.a;
                }
                let byte = self.index_8bit();
                self.set_zn(self.x, byte);
            }
            0xab => {
                // PLB
                self.addr_implied();
                self.idle();
                self.db = self.pull_u8();
                let db = self.db as u16;
                self.set_zn(db, true);
            }
            0xac => {
                let (low, high) = self.addr_absolute();
                self.ldy(low, high);
            }
            0xad => {
                let (low, high) = self.addr_absolute();
                self.lda(low, high);
            }
            0xae => {
                let (low, high) = self.addr_absolute();
                self.ldx(low, high);
            }
            0xaf => {
                let (low, high) = self.addr_absolute_long();
                self.lda(low, high);
            }
            0xb0 => {
                // BCS
                let condition = self.p.contains(StatusFlags::CARRY);
                self.do_branch(condition);
            }
            0xb1 => {
                let (low, high) = self.addr_indirect_y(false);
                self.lda(low, high);
            }
            0xb2 => {
                let (low, high) = self.addr_indirect();
                self.lda(low, high);
            }
            0xb3 => {
                let (low, high) = self.addr_stack_relative_indirect_y();
                self.lda(low, high);
            }
            0xb4 => {
                let (low, high) = self.addr_direct_x();
                self.ldy(low, high);
            }
            0xb5 => {
                let (low, high) = self.addr_direct_x();
                self.lda(low, high);
            }
            0xb6 => {
                let (low, high) = self.addr_direct_y();
                self.ldx(low, high);
            }
            0xb7 => {
                let (low, high) = self.addr_indirect_long_y();
                self.lda(low, high);
            }
            0xb8 => {
                // CLV
                self.addr_implied();
                self.p.remove(StatusFlags::OVERFLOW);
            }
            0xb9 => {
                let (low, high) = self.addr_absolute_y(false);
                self.lda(low, high);
            }
            0xba => {
                // TSX
                self.addr_implied();
                if self.index_8bit() {
                    self.x = self.sp & 0xff;
                } else {
                    self.x = self.sp;
                }
                let byte = self.index_8bit();
                self.set_zn(self.x, byte);
            }
            0xbb => {
                // TYX
                self.addr_implied();
                if self.index_8bit() {
                    self.x = self.y & 0xff;
                } else {
                    self.x = self.y;
                }
                let byte = self.index_8bit();
                self.set_zn(self.x, byte);
            }
            0xbc => {
                let (low, high) = self.addr_absolute_x(false);
                self.ldy(low, high);
            }
            0xbd => {
                let (low, high) = self.addr_absolute_x(false);
                self.lda(low, high);
            }
            0xbe => {
                let (low, high) = self.addr_absolute_y(false);
                self.ldx(low, high);
            }
            0xbf => {
                let (low, high) = self.addr_absolute_long_x();
                self.lda(low, high);
            }
            0xc0 => {
                let (low, high) = self.addr_immediate(true);
                self.cpy(low, high);
            }
            0xc1 => {
                let (low, high) = self.addr_indirect_x();
                self.cmp(low, high);
            }
            0xc2 => {
                // REP: in emulation mode bits 4/5 of the operand are forced
                // to zero before the mask clears flags.
                let mut value = self.read_opcode();
                self.check_interrupts();
                if self.emulation_mode {
                    value &= !0x30;
                }
                let flags = self.p.bits() & !value;
                self.set_flags_byte(flags);
                self.idle();
            }
            0xc3 => {
                let (low, high) = self.addr_stack_relative();
                self.cmp(low, high);
            }
            0xc4 => {
                let (low, high) = self.addr_direct();
                self.cpy(low, high);
            }
            0xc5 => {
                let (low, high) = self.addr_direct();
                self.cmp(low, high);
            }
            0xc6 => {
                let (low, high) = self.addr_direct();
                self.dec(low, high);
            }
            0xc7 => {
                let (low, high) = self.addr_indirect_long();
                self.cmp(low, high);
            }
            0xc8 => {
                // INY
                self.addr_implied();
                if self.index_8bit() {
                    self.y = self.y.wrapping_add(1) & 0xff;
                } else {
                    self.y = self.y.wrapping_add(1);
                }
                let byte = self.index_8bit();
                self.set_zn(self.y, byte);
            }
            0xc9 => {
                let (low, high) = self.addr_immediate(false);
                self.cmp(low, high);
            }
            0xca => {
                // DEX
                self.addr_implied();
                if self.index_8bit() {
                    self.x = self.x.wrapping_sub(1) & 0xff;
                } else {
                    self.x = self.x.wrapping_sub(1);
                }
                let byte = self.index_8bit();
                self.set_zn(self.x, byte);
            }
            0xcb => {
                // WAI
                self.waiting = true;
                self.idle();
                self.idle();
            }
            0xcc => {
                let (low, high) = self.addr_absolute();
                self.cpy(low, high);
            }
            0xcd => {
                let (low, high) = self.addr_absolute();
                self.cmp(low, high);
            }
            0xce => {
                let (low, high) = self.addr_absolute();
                self.dec(low, high);
            }
            0xcf => {
                let (low, high) = self.addr_absolute_long();
                self.cmp(low, high);
            }
            0xd0 => {
                // BNE
                let condition = !self.p.contains(StatusFlags::ZERO);
                self.do_branch(condition);
            }
            0xd1 => {
                let (low, high) = self.addr_indirect_y(false);
                self.cmp(low, high);
            }
            0xd2 => {
                let (low, high) = self.addr_indirect();
                self.cmp(low, high);
            }
            0xd3 => {
                let (low, high) = self.addr_stack_relative_indirect_y();
                self.cmp(low, high);
            }
            0xd4 => {
                // PEI
                let (low, high) = self.addr_direct();
                let value = self.read_word(low, high, false);
                self.push_u16(value, true);
            }
            0xd5 => {
                let (low, high) = self.addr_direct_x();
                self.cmp(low, high);
            }
            0xd6 => {
                let (low, high) = self.addr_direct_x();
                self.dec(low, high);
            }
            0xd7 => {
                let (low, high) = self.addr_indirect_long_y();
                self.cmp(low, high);
            }
            0xd8 => {
                // CLD
                self.addr_implied();
                self.p.remove(StatusFlags::DECIMAL);
            }
            0xd9 => {
                let (low, high) = self.addr_absolute_y(false);
                self.cmp(low, high);
            }
            0xda => {
                // PHX
                self.addr_implied();
                if self.index_8bit() {
                    let value = self.x as u8;
                    self.push_u8(value);
                } else {
                    let value = self.x;
                    self.push_u16(value, true);
                }
            }
            0xdb => {
                // STP: only a reset leaves this state.
                self.stopped = true;
                log::warn!(
                    "STP at {:02X}:{:04X}; core halted until reset",
                    self.pb,
                    self.pc.wrapping_sub(1)
                );
                self.idle();
                self.idle();
            }
            0xdc => {
                // JML [abs]: pointer and bank read from bank 0.
                let addr = self.read_opcode_word(false);
                self.pc = self.read_word(addr as u32, addr.wrapping_add(1) as u32 & 0xffff, false);
                self.check_interrupts();
                self.pb = self.read(addr.wrapping_add(2) as u32 & 0xffff);
            }
            0xdd => {
                let (low, high) = self.addr_absolute_x(false);
                self.cmp(low, high);
            }
            0xde => {
                let (low, high) = self.addr_absolute_x(true);
                self.dec(low, high);
            }
            0xdf => {
                let (low, high) = self.addr_absolute_long_x();
                self.cmp(low, high);
            }
            0xe0 => {
                let (low, high) = self.addr_immediate(true);
                self.cpx(low, high);
            }
            0xe1 => {
                let (low, high) = self.addr_indirect_x();
                self.sbc(low, high);
            }
            0xe2 => {
                // SEP: same emulation-mode masking as REP.
                let mut value = self.read_opcode();
                self.check_interrupts();
                if self.emulation_mode {
                    value &= !0x30;
                }
                let flags = self.p.bits() | value;
                self.set_flags_byte(flags);
                self.idle();
            }
            0xe3 => {
                let (low, high) = self.addr_stack_relative();
                self.sbc(low, high);
            }
            0xe4 => {
                let (low, high) = self.addr_direct();
                self.cpx(low, high);
            }
            0xe5 => {
                let (low, high) = self.addr_direct();
                self.sbc(low, high);
            }
            0xe6 => {
                let (low, high) = self.addr_direct();
                self.inc(low, high);
            }
            0xe7 => {
                let (low, high) = self.addr_indirect_long();
                self.sbc(low, high);
            }
            0xe8 => {
                // INX
                self.addr_implied();
                if self.index_8bit() {
                    self.x = self.x.wrapping_add(1) & 0xff;
                } else {
                    self.x = self.x.wrapping_add(1);
                }
                let byte = self.index_8bit();
                self.set_zn(self.x, byte);
            }
            0xe9 => {
                let (low, high) = self.addr_immediate(false);
                self.sbc(low, high);
            }
            0xea => {
                // NOP
                self.addr_implied();
            }
            0xeb => {
                // XBA: Z/N from the new low byte.
                self.addr_implied();
                self.a = self.a.rotate_left(8);
                let a = self.a;
                self.set_zn(a, true);
            }
            0xec => {
                let (low, high) = self.addr_absolute();
                self.cpx(low, high);
            }
            0xed => {
                let (low, high) = self.addr_absolute();
                self.sbc(low, high);
            }
            0xee => {
                let (low, high) = self.addr_absolute();
                self.inc(low, high);
            }
            0xef => {
                let (low, high) = self.addr_absolute_long();
                self.sbc(low, high);
            }
            0xf0 => {
                // BEQ
                let condition = self.p.contains(StatusFlags::ZERO);
                self.do_branch(condition);
            }
            0xf1 => {
                let (low, high) = self.addr_indirect_y(false);
                self.sbc(low, high);
            }
            0xf2 => {
                let (low, high) = self.addr_indirect();
                self.sbc(low, high);
            }
            0xf3 => {
                let (low, high) = self.addr_stack_relative_indirect_y();
                self.sbc(low, high);
            }
            0xf4 => {
                // PEA
                let value = self.read_opcode_word(false);
                self.push_u16(value, true);
            }
            0xf5 => {
                let (low, high) = self.addr_direct_x();
                self.sbc(low, high);
            }
            0xf6 => {
                let (low, high) = self.addr_direct_x();
                self.inc(low, high);
            }
            0xf7 => {
                let (low, high) = self.addr_indirect_long_y();
                self.sbc(low, high);
            }
            0xf8 => {
                // SED
                self.addr_implied();
                self.p.insert(StatusFlags::DECIMAL);
            }
            0xf9 => {
                let (low, high) = self.addr_absolute_y(false);
                self.sbc(low, high);
            }
            0xfa => {
                // PLX
                self.addr_implied();
                self.idle();
                if self.index_8bit() {
                    self.x = self.pull_u8() as u16;
                } else {
                    self.x = self.pull_u16(true);
                }
                let byte = self.index_8bit();
                self.set_zn(self.x, byte);
            }
            0xfb => {
                // XCE: swap C and E; width flags only change when E did.
                self.addr_implied();
                let old_carry = self.carry();
                let old_e = self.emulation_mode;
                self.p.set(StatusFlags::CARRY, old_e);
                self.emulation_mode = old_carry;
                if self.emulation_mode != old_e {
                    if self.emulation_mode {
                        self.p
                            .insert(StatusFlags::MEMORY_8BIT | StatusFlags::INDEX_8BIT);
                        self.sp = (self.sp & 0xff) | 0x100;
                        self.x &= 0xff;
                        self.y &= 0xff;
                    } else {
                        self.p
                            .remove(StatusFlags::MEMORY_8BIT | StatusFlags::INDEX_8BIT);
                    }
                }
            }
            0xfc => {
                // JSR (abs,X)
                let addr = self.read_opcode_word(false);
                let ret = self.pc.wrapping_sub(1);
                self.push_u16(ret, false);
                self.idle();
                let base = ((self.pb as u32) << 16) | addr as u32;
                let x = self.x as u32;
                self.pc = self.read_word(base + x, base + x + 1, true);
            }
            0xfd => {
                let (low, high) = self.addr_absolute_x(false);
                self.sbc(low, high);
            }
            0xfe => {
                let (low, high) = self.addr_absolute_x(true);
                self.inc(low, high);
            }
            0xff => {
                let (low, high) = self.addr_absolute_long_x();
                self.sbc(low, high);
            }
        }
    }
}
