//! In-memory `CommandRunner` for tests: records every command and replies
//! with canned outcomes.

use std::cell::RefCell;
use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;

use anyhow::Result;

use crate::command::{CommandOutcome, RunnerCommand};
use crate::lifecycle::DetachedSession;
use crate::CommandRunner;

struct Rule {
    program: String,
    prefix: Vec<String>,
    outcomes: VecDeque<CommandOutcome>,
}

#[derive(Default)]
pub struct ScriptedRunner {
    rules: RefCell<Vec<Rule>>,
    available: RefCell<HashSet<String>>,
    ran: RefCell<Vec<RunnerCommand>>,
    spawned: RefCell<Vec<RunnerCommand>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_programs(programs: &[&str]) -> Self {
        let runner = Self::new();
        for program in programs {
            runner.make_available(program);
        }
        runner
    }

    pub fn make_available(&self, program: &str) {
        self.available.borrow_mut().insert(program.to_string());
    }

    /// Queues `outcome` for commands matching `program` + `prefix`. The last
    /// queued outcome for a rule repeats once earlier ones are consumed.
    pub fn respond(&self, program: &str, prefix: &[&str], outcome: CommandOutcome) {
        let mut rules = self.rules.borrow_mut();
        let prefix: Vec<String> = prefix.iter().map(|s| s.to_string()).collect();
        if let Some(rule) = rules
            .iter_mut()
            .find(|rule| rule.program == program && rule.prefix == prefix)
        {
            rule.outcomes.push_back(outcome);
            return;
        }
        rules.push(Rule {
            program: program.to_string(),
            prefix,
            outcomes: VecDeque::from([outcome]),
        });
    }

    pub fn commands(&self) -> Vec<RunnerCommand> {
        self.ran.borrow().clone()
    }

    pub fn spawned(&self) -> Vec<RunnerCommand> {
        self.spawned.borrow().clone()
    }

    pub fn ran(&self, program: &str, prefix: &[&str]) -> bool {
        self.ran.borrow().iter().any(|cmd| cmd.matches(program, prefix))
    }

    pub fn count(&self, program: &str, prefix: &[&str]) -> usize {
        self.ran
            .borrow()
            .iter()
            .filter(|cmd| cmd.matches(program, prefix))
            .count()
    }

    fn outcome_for(&self, command: &RunnerCommand) -> CommandOutcome {
        let mut rules = self.rules.borrow_mut();
        // Longest matching prefix wins so specific rules override broad ones.
        let rule = rules
            .iter_mut()
            .filter(|rule| {
                let prefix: Vec<&str> = rule.prefix.iter().map(String::as_str).collect();
                command.matches(&rule.program, &prefix)
            })
            .max_by_key(|rule| rule.prefix.len());
        match rule {
            Some(rule) if rule.outcomes.len() > 1 => rule.outcomes.pop_front().unwrap_or_default(),
            Some(rule) => rule.outcomes.front().cloned().unwrap_or_default(),
            None => CommandOutcome::ok(""),
        }
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, command: &RunnerCommand) -> Result<CommandOutcome> {
        self.ran.borrow_mut().push(command.clone());
        Ok(self.outcome_for(command))
    }

    fn spawn_detached(&self, command: &RunnerCommand) -> Result<DetachedSession> {
        self.spawned.borrow_mut().push(command.clone());
        Ok(DetachedSession {
            pid: 4000 + self.spawned.borrow().len() as u32,
            command: command.to_string(),
        })
    }

    fn locate(&self, program: &str) -> Option<PathBuf> {
        self.available
            .borrow()
            .contains(program)
            .then(|| PathBuf::from("/usr/bin").join(program))
    }
}
