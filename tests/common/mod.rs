#![allow(dead_code)]

use std::collections::VecDeque;

use lmcc::{Program, Word, MEMORY_SIZE};

/// Steps allowed before a run is considered stuck.
pub const STEP_LIMIT: usize = 10_000;

/// Why a run stopped before `HLT`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Fault {
    InputExhausted,
    StepLimit,
    InvalidInstr { pc: usize, word: i32 },
}

/// Everything a run can observe from the outside.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Outcome {
    pub output: Vec<i32>,
    pub fault: Option<Fault>,
}

/// Complete machine state during a test run.
pub struct RunState {
    mem: [i32; MEMORY_SIZE],
    pc: usize,
    acc: i32,
    input: VecDeque<i32>,
    output: Vec<i32>,
    halted: bool,
    fault: Option<Fault>,
}

impl RunState {
    pub fn from_words(words: &[Word], input: &[i32]) -> RunState {
        assert!(words.len() <= MEMORY_SIZE, "image does not fit in memory");
        let mut mem = [0; MEMORY_SIZE];
        for (cell, word) in mem.iter_mut().zip(words) {
            *cell = *word as i32;
        }
        RunState {
            mem,
            pc: 0,
            acc: 0,
            input: input.iter().copied().collect(),
            output: Vec::new(),
            halted: false,
            fault: None,
        }
    }

    const OP_TABLE: [fn(&mut RunState, usize); 10] = [
        Self::hlt,     // 0xx
        Self::add,     // 1xx
        Self::sub,     // 2xx
        Self::sta,     // 3xx
        Self::invalid, // 4xx
        Self::lda,     // 5xx
        Self::bra,     // 6xx
        Self::brz,     // 7xx
        Self::brp,     // 8xx
        Self::io,      // 9xx
    ];

    pub fn run(&mut self, max_steps: usize) -> Outcome {
        let mut steps = 0;
        while !self.halted && self.fault.is_none() {
            if steps == max_steps {
                self.fault = Some(Fault::StepLimit);
                break;
            }
            if self.pc >= MEMORY_SIZE {
                self.fault = Some(Fault::InvalidInstr {
                    pc: self.pc,
                    word: 0,
                });
                break;
            }
            let instr = self.mem[self.pc];
            // PC incremented before instruction is performed
            self.pc += 1;
            if !(0..=999).contains(&instr) {
                self.invalid(0);
                break;
            }
            let opcode = (instr / 100) as usize;
            let operand = (instr % 100) as usize;
            Self::OP_TABLE[opcode](self, operand);
            steps += 1;
        }
        Outcome {
            output: self.output.clone(),
            fault: self.fault,
        }
    }

    fn hlt(&mut self, operand: usize) {
        if operand != 0 {
            return self.invalid(operand);
        }
        self.halted = true;
    }

    fn add(&mut self, operand: usize) {
        self.acc = self.acc.wrapping_add(self.mem[operand]);
    }

    fn sub(&mut self, operand: usize) {
        self.acc = self.acc.wrapping_sub(self.mem[operand]);
    }

    fn sta(&mut self, operand: usize) {
        self.mem[operand] = self.acc;
    }

    fn lda(&mut self, operand: usize) {
        self.acc = self.mem[operand];
    }

    fn bra(&mut self, operand: usize) {
        self.pc = operand;
    }

    fn brz(&mut self, operand: usize) {
        if self.acc == 0 {
            self.pc = operand;
        }
    }

    fn brp(&mut self, operand: usize) {
        if self.acc >= 0 {
            self.pc = operand;
        }
    }

    fn io(&mut self, operand: usize) {
        match operand {
            1 => match self.input.pop_front() {
                Some(val) => self.acc = val,
                None => self.fault = Some(Fault::InputExhausted),
            },
            2 => self.output.push(self.acc),
            _ => self.invalid(operand),
        }
    }

    fn invalid(&mut self, _operand: usize) {
        let pc = self.pc.saturating_sub(1);
        self.fault = Some(Fault::InvalidInstr {
            pc,
            word: self.mem[pc],
        });
    }
}

/// Run a compiled program to completion on the given input.
pub fn run(program: &Program, input: &[i32]) -> Outcome {
    RunState::from_words(&program.words(), input).run(STEP_LIMIT)
}

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}
