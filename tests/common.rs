#![allow(dead_code)]

// filename according to https://doc.rust-lang.org/book/ch11-03-test-organization.html
use embedded_storage::{ReadStorage, Storage};
use esptemp_settings::EEPROM_SIZE;
use esptemp_settings::platform::Platform;

/// Mock of the emulated EEPROM, at the same seam the device HAL sits at:
/// `shadow` is the RAM copy every read and write goes through, `committed`
/// is what the physical flash holds. Only `commit` moves shadow to
/// committed, and only `power_cycle` moves committed back.
pub struct Eeprom {
    pub shadow: Vec<u8>,
    pub committed: Vec<u8>,
    pub operations: Vec<Operation>,
    pub fail_after_operation: usize,
    pub fail_commits: bool,
}

#[derive(Debug, PartialEq, Clone)]
pub enum Operation {
    Read { offset: u32, len: usize },
    Write { offset: u32, len: usize },
    Commit,
}

impl Eeprom {
    pub fn new() -> Self {
        Self::with_size(EEPROM_SIZE)
    }

    pub fn with_size(size: usize) -> Self {
        Self {
            shadow: vec![0xffu8; size],
            committed: vec![0xffu8; size],
            operations: Vec::new(),
            fail_after_operation: usize::MAX,
            fail_commits: false,
        }
    }

    pub fn new_with_fault(fail_after_operation: usize) -> Self {
        Self {
            fail_after_operation,
            ..Self::new()
        }
    }

    /// Region holding `value` in the layout a healthy device would have
    /// written: signature, null-terminated value, zero fill, everything
    /// mirrored and committed.
    pub fn seeded(value: &str) -> Self {
        let mut eeprom = Self::new();

        let mut logical = vec![0u8; EEPROM_SIZE / 2];
        logical[..7].copy_from_slice(b"TMPSENS");
        logical[7..7 + value.len()].copy_from_slice(value.as_bytes());

        for (i, &byte) in logical.iter().enumerate() {
            eeprom.shadow[i] = byte;
            eeprom.shadow[EEPROM_SIZE - 1 - i] = byte;
        }
        eeprom.committed = eeprom.shadow.clone();
        eeprom
    }

    pub fn disable_faults(&mut self) {
        self.fail_after_operation = usize::MAX;
        self.fail_commits = false;
    }

    /// Loses everything that was not committed, as pulling the plug would.
    pub fn power_cycle(&mut self) {
        self.shadow = self.committed.clone();
    }

    /// Flips every bit of the byte at `offset`, in the RAM copy and on the
    /// flash at once, leaving the mirror byte untouched.
    pub fn corrupt_byte(&mut self, offset: u32) {
        self.shadow[offset as usize] ^= 0xff;
        self.committed[offset as usize] ^= 0xff;
    }

    pub fn commits(&self) -> usize {
        self.operations
            .iter()
            .filter(|op| matches!(op, Operation::Commit))
            .count()
    }

    pub fn dump_operations(&self) {
        println!("Operations:");
        for op in &self.operations {
            println!("  {:?}", op);
        }
    }
}

#[derive(Debug)]
pub struct EepromFault;

impl Platform for Eeprom {
    type Error = EepromFault;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        println!(
            "    eeprom: read:   0x{offset:02X}[0x{:02X}] #{:>2}",
            bytes.len(),
            self.operations.len()
        );
        if self.operations.len() >= self.fail_after_operation {
            println!("    eeprom: FAULT");
            return Err(EepromFault);
        }
        self.operations.push(Operation::Read {
            offset,
            len: bytes.len(),
        });

        let offset = offset as usize;
        bytes.copy_from_slice(&self.shadow[offset..offset + bytes.len()]);
        Ok(())
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        println!(
            "    eeprom: write:  0x{offset:02X}[0x{:02X}] #{:>2}",
            bytes.len(),
            self.operations.len()
        );
        if self.operations.len() >= self.fail_after_operation {
            println!("    eeprom: FAULT");
            return Err(EepromFault);
        }
        self.operations.push(Operation::Write {
            offset,
            len: bytes.len(),
        });

        let offset = offset as usize;
        self.shadow[offset..offset + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    fn commit(&mut self) -> Result<(), Self::Error> {
        println!("    eeprom: commit #{:>2}", self.operations.len());
        if self.operations.len() >= self.fail_after_operation {
            println!("    eeprom: FAULT");
            return Err(EepromFault);
        }
        if self.fail_commits {
            println!("    eeprom: COMMIT FAULT");
            return Err(EepromFault);
        }
        self.operations.push(Operation::Commit);

        self.committed = self.shadow.clone();
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.shadow.len()
    }
}

/// Bare storage backend for exercising `ShadowEeprom` itself.
pub struct RamFlash {
    pub buf: Vec<u8>,
    pub writes: usize,
}

impl RamFlash {
    pub fn new(size: usize) -> Self {
        Self {
            buf: vec![0xffu8; size],
            writes: 0,
        }
    }
}

#[derive(Debug)]
pub struct RamFlashError;

impl ReadStorage for RamFlash {
    type Error = RamFlashError;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        let offset = offset as usize;
        bytes.copy_from_slice(&self.buf[offset..offset + bytes.len()]);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.buf.len()
    }
}

impl Storage for RamFlash {
    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        self.writes += 1;
        let offset = offset as usize;
        self.buf[offset..offset + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }
}
