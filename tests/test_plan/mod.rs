use colloquy::*;

#[derive(Debug, PartialEq, Eq)]
pub enum PlanStep {
    Line(String),
    Option(String),
    Select(usize),
    Click,
    Elapse,
    Stop,
}

impl PlanStep {
    fn new(line: &str) -> Self {
        let mut split_line = line.splitn(2, ':');
        let kind = split_line.next().map(str::trim);
        let value = split_line.next().map(str::trim).unwrap_or("").to_owned();
        match kind {
            Some("line") => Self::Line(value),
            Some("option") => Self::Option(value),
            Some("select") => {
                let index: usize = value.parse().unwrap();
                if index < 1 {
                    panic!("Select index must be 1 or greater.");
                }
                Self::Select(index - 1)
            }
            Some("click") => Self::Click,
            Some("elapse") => Self::Elapse,
            Some("stop") => Self::Stop,
            Some(step) => panic!(
                "Could not parse test plan step \"{}\" in line \"{}\"",
                step, line
            ),
            None => panic!("Could not parse test plan step in line \"{}\"", line),
        }
    }
}

static STOP: PlanStep = PlanStep::Stop;

pub struct TestPlan {
    steps: Vec<PlanStep>,
    next_step_index: usize,
}

impl TestPlan {
    pub fn parse(plan_text: &str) -> Self {
        let steps: Vec<_> = plan_text
            .lines()
            .map(|line| line.trim_start())
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(PlanStep::new)
            .collect();

        Self {
            steps,
            next_step_index: 0,
        }
    }

    /// Takes the next step. Running off the end of the plan reads as a stop.
    pub fn next(&mut self) -> &PlanStep {
        let step = self.steps.get(self.next_step_index).unwrap_or(&STOP);
        self.next_step_index += 1;
        step
    }

    pub fn is_done(&self) -> bool {
        self.next_step_index >= self.steps.len()
    }
}

/// Plays a reader and checks everything it shows and waits for against a
/// plan.
pub struct PlanRunner {
    reader: DialogueReader,
    plan: TestPlan,
    context: ReaderContext,
    starter: String,
}

impl PlanRunner {
    pub fn new(reader: DialogueReader, plan: &str) -> Self {
        let _ = pretty_env_logger::try_init();

        Self {
            reader,
            plan: TestPlan::parse(plan),
            context: ReaderContext::new("en"),
            starter: DEFAULT_STARTER.to_string(),
        }
    }

    pub fn with_context(mut self, context: ReaderContext) -> Self {
        self.context = context;
        self
    }

    pub fn from_starter(mut self, starter: &str) -> Self {
        self.starter = starter.to_string();
        self
    }

    pub fn run(mut self) -> DialogueReader {
        let mut events = self.reader
            .start_from(&self.starter, self.context.clone())
            .unwrap();

        loop {
            let ended = self.check_events(&events);
            if ended {
                break;
            }

            events = match self.reader.state().clone() {
                ReaderState::AwaitingAdvance { reason: WaitReason::Click, .. } => {
                    self.expect(PlanStep::Click);
                    self.reader.advance(AdvanceSignal::Click)
                }
                ReaderState::AwaitingAdvance { reason: WaitReason::Timer, wait_id, .. } => {
                    self.expect(PlanStep::Elapse);
                    self.reader.advance(AdvanceSignal::TimerElapsed { wait_id })
                }
                ReaderState::AwaitingAdvance { reason: WaitReason::AudioEnd, wait_id, .. } => {
                    self.expect(PlanStep::Elapse);
                    self.reader.advance(AdvanceSignal::AudioFinished { wait_id })
                }
                ReaderState::AwaitingPlayerChoice { .. } => match self.plan.next() {
                    PlanStep::Select(i) => {
                        let i = *i;
                        self.reader.choose_line(i).unwrap()
                    }
                    step => panic!("Expected PlanStep::Select, got {:?}", step),
                },
                state => panic!("Reader stopped in {:?} without ending the reading", state),
            };
        }

        assert!(self.plan.is_done(), "The dialogue ended before the plan did");
        self.reader
    }

    /// Checks shown lines and answers. Returns whether the reading ended.
    fn check_events(&mut self, events: &[ReaderEvent]) -> bool {
        for event in events {
            match event {
                ReaderEvent::DisplayLine { text, .. } => {
                    // Assert that the test plan expects this line.
                    self.expect(PlanStep::Line(text.clone()));
                }
                ReaderEvent::ShowAnswers(options) => {
                    // Assert that the test plan expects these options.
                    for option in options {
                        self.expect(PlanStep::Option(option.text.clone()));
                    }
                }
                ReaderEvent::ReadingEnded => {
                    // Assert that the test plan expects the end of dialogue.
                    self.expect(PlanStep::Stop);
                    return true;
                }
                _ => {}
            }
        }
        false
    }

    fn expect(&mut self, expected: PlanStep) {
        let index = self.plan.next_step_index;
        let step = self.plan.next();
        assert_eq!(*step, expected, "[step {}] unexpected reader output", index + 1);
    }
}
