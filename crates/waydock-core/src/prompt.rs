use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{self, BufRead, Write};

use anyhow::Result;
use log::info;

/// Operator interaction seam. `None` means the operator gave no answer (EOF).
pub trait Prompter {
    fn confirm(&self, question: &str, default: bool) -> Result<bool>;

    /// Like `confirm`, but never answered by `--yes`. Used where a wrong
    /// automatic answer would destroy another process's state.
    fn confirm_interactive(&self, question: &str, default: bool) -> Result<bool> {
        self.confirm(question, default)
    }

    fn select(&self, question: &str, options: &[&str]) -> Result<Option<usize>>;
    fn input(&self, prompt: &str) -> Result<Option<String>>;
}

/// Reads answers from stdin. `assume_yes` only auto-confirms `confirm`;
/// selections and interactive confirmations still ask.
pub struct StdinPrompter {
    assume_yes: bool,
    input: RefCell<Box<dyn BufRead>>,
}

impl StdinPrompter {
    pub fn new(assume_yes: bool) -> Self {
        Self::with_input(assume_yes, Box::new(io::stdin().lock()))
    }

    pub fn with_input(assume_yes: bool, input: Box<dyn BufRead>) -> Self {
        Self {
            assume_yes,
            input: RefCell::new(input),
        }
    }

    fn read_line(&self) -> Result<Option<String>> {
        let mut line = String::new();
        let bytes = self.input.borrow_mut().read_line(&mut line)?;
        if bytes == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }
}

impl Prompter for StdinPrompter {
    fn confirm(&self, question: &str, default: bool) -> Result<bool> {
        if self.assume_yes {
            info!("auto-confirmed: {question}");
            return Ok(true);
        }
        self.confirm_interactive(question, default)
    }

    fn confirm_interactive(&self, question: &str, default: bool) -> Result<bool> {
        let hint = if default { "[Y/n]" } else { "[y/N]" };
        loop {
            print!("{question} {hint} ");
            io::stdout().flush()?;
            let Some(answer) = self.read_line()? else {
                return Ok(default);
            };
            match answer.to_lowercase().as_str() {
                "" => return Ok(default),
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                _ => println!("Please answer y or n."),
            }
        }
    }

    fn select(&self, question: &str, options: &[&str]) -> Result<Option<usize>> {
        println!("{question}");
        for (index, option) in options.iter().enumerate() {
            println!("  {}) {}", index + 1, option);
        }
        loop {
            print!("Choice [1-{}]: ", options.len());
            io::stdout().flush()?;
            let Some(answer) = self.read_line()? else {
                return Ok(None);
            };
            match answer.parse::<usize>() {
                Ok(choice) if (1..=options.len()).contains(&choice) => return Ok(Some(choice - 1)),
                _ => println!("Invalid choice: {answer}"),
            }
        }
    }

    fn input(&self, prompt: &str) -> Result<Option<String>> {
        print!("{prompt}");
        io::stdout().flush()?;
        self.read_line()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    Confirm(bool),
    Select(Option<usize>),
    Input(Option<String>),
}

/// Answers prompts from a fixed queue; an exhausted queue behaves like EOF.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: RefCell<VecDeque<Answer>>,
    asked: RefCell<Vec<String>>,
}

impl ScriptedPrompter {
    pub fn new(answers: impl IntoIterator<Item = Answer>) -> Self {
        Self {
            answers: RefCell::new(answers.into_iter().collect()),
            asked: RefCell::new(Vec::new()),
        }
    }

    pub fn asked(&self) -> Vec<String> {
        self.asked.borrow().clone()
    }

    fn next(&self, question: &str) -> Option<Answer> {
        self.asked.borrow_mut().push(question.to_string());
        self.answers.borrow_mut().pop_front()
    }
}

impl Prompter for ScriptedPrompter {
    fn confirm(&self, question: &str, default: bool) -> Result<bool> {
        match self.next(question) {
            Some(Answer::Confirm(value)) => Ok(value),
            Some(other) => Err(anyhow::anyhow!("expected confirm answer, got {other:?}")),
            None => Ok(default),
        }
    }

    fn select(&self, question: &str, _options: &[&str]) -> Result<Option<usize>> {
        match self.next(question) {
            Some(Answer::Select(value)) => Ok(value),
            Some(other) => Err(anyhow::anyhow!("expected select answer, got {other:?}")),
            None => Ok(None),
        }
    }

    fn input(&self, prompt: &str) -> Result<Option<String>> {
        match self.next(prompt) {
            Some(Answer::Input(value)) => Ok(value),
            Some(other) => Err(anyhow::anyhow!("expected input answer, got {other:?}")),
            None => Ok(None),
        }
    }
}
