//! Built-in question bank: five English tasks per level so the service is usable without config.

use crate::domain::{Question, QuestionKind};

fn q(id: &str, level: u8, points: u32, time_limit_secs: u32, prompt: &str, explanation: &str, kind: QuestionKind) -> Question {
  Question {
    id: id.into(),
    level,
    points,
    time_limit_secs,
    prompt: prompt.into(),
    explanation: explanation.into(),
    kind,
  }
}

fn strs(items: &[&str]) -> Vec<String> {
  items.iter().map(|s| s.to_string()).collect()
}

fn mcq(options: &[&str], correct: usize) -> QuestionKind {
  QuestionKind::MultipleChoice { options: strs(options), correct }
}

fn cloze(text: &str, answers: &[&[&str]]) -> QuestionKind {
  QuestionKind::Cloze { text: text.into(), answers: answers.iter().map(|a| strs(a)).collect() }
}

fn order(tokens: &[&str]) -> QuestionKind {
  QuestionKind::WordOrder { tokens: strs(tokens) }
}

pub fn seed_questions() -> Vec<Question> {
  vec![
    // A1
    q("a1-mcq-be", 0, 5, 20, "Choose the correct word: She ___ a teacher.", "Third person singular of 'to be' is 'is'.",
      mcq(&["am", "is", "are"], 1)),
    q("a1-cloze-have", 0, 5, 20, "Fill the gap.", "'I' takes 'have'.",
      cloze("I ___ two brothers.", &[&["have"]])),
    q("a1-order-name", 0, 5, 25, "Put the words in order.", "Subject + verb + complement.",
      order(&["My", "name", "is", "Anna"])),
    q("a1-listen-time", 0, 5, 25, "Listen. What time is it?", "'Half past seven' is 7:30.",
      QuestionKind::Listening {
        transcript: "It is half past seven.".into(),
        locale: "en-GB".into(),
        options: strs(&["7:15", "7:30", "6:30"]),
        correct: 1,
      }),
    q("a1-bank-family", 0, 5, 25, "Complete with words from the box.", "'Mother' and 'father' are parents.",
      QuestionKind::WordBank {
        text: "My ___ and my ___ are my parents.".into(),
        bank: strs(&["mother", "father", "sister", "table"]),
        answers: strs(&["mother", "father"]),
      }),
    // A2
    q("a2-mcq-past", 1, 8, 25, "Yesterday we ___ to the cinema.", "Irregular past of 'go' is 'went'.",
      mcq(&["go", "went", "gone"], 1)),
    q("a2-cloze-comparative", 1, 8, 25, "Fill the gap with the comparative.", "Short adjectives take -er.",
      cloze("My flat is ___ than yours.", &[&["smaller", "bigger", "cheaper"]])),
    q("a2-order-question", 1, 8, 30, "Build the question.", "Auxiliary 'do' comes before the subject.",
      order(&["Where", "do", "you", "live", "?"])),
    q("a2-read-notice", 1, 8, 40, "Read the notice and answer.", "The shop opens at 9 on Sunday.",
      QuestionKind::Reading {
        passage: "Opening hours: Monday to Saturday 8am-8pm. Sunday 9am-1pm.".into(),
        options: strs(&["It is closed on Sunday.", "It opens at 9 on Sunday.", "It closes at 8 on Sunday."]),
        correct: 1,
      }),
    q("a2-listen-directions", 1, 8, 30, "Listen. Where is the bank?", "'Next to' means beside.",
      QuestionKind::Listening {
        transcript: "The bank is next to the post office.".into(),
        locale: "en-US".into(),
        options: strs(&["Opposite the post office", "Next to the post office", "Behind the station"]),
        correct: 1,
      }),
    // B1
    q("b1-mcq-present-perfect", 2, 10, 30, "I ___ in London since 2019.", "'Since' + starting point takes the present perfect.",
      mcq(&["live", "lived", "have lived", "am living"], 2)),
    q("b1-cloze-conditional", 2, 10, 30, "Complete the first conditional.", "If + present, will + infinitive.",
      cloze("If it ___ tomorrow, we ___ stay at home.", &[&["rains"], &["will", "'ll"]])),
    q("b1-reform-passive", 2, 12, 45, "Rewrite in the passive.", "Object becomes subject; 'be' + past participle.",
      QuestionKind::Reformulation {
        source: "Someone stole my bike.".into(),
        accepted: strs(&["My bike was stolen.", "My bike was stolen by someone."]),
      }),
    q("b1-order-relative", 2, 10, 35, "Put the words in order.", "Defining relative clause with 'who'.",
      order(&["The", "woman", "who", "called", "is", "my", "boss"])),
    q("b1-bank-linkers", 2, 10, 35, "Complete with a linker from the box.", "'Although' introduces contrast.",
      QuestionKind::WordBank {
        text: "___ it was late, she kept working.".into(),
        bank: strs(&["Although", "Because", "So", "Unless"]),
        answers: strs(&["Although"]),
      }),
    // B2
    q("b2-mcq-wish", 3, 12, 35, "I wish I ___ more time.", "'Wish' about the present takes the past simple.",
      mcq(&["have", "had", "will have", "would have"], 1)),
    q("b2-cloze-phrasal", 3, 12, 35, "Complete with a phrasal verb.", "'Put off' means postpone.",
      cloze("They had to ___ ___ the meeting until Friday.", &[&["put"], &["off"]])),
    q("b2-reform-reported", 3, 14, 50, "Report the sentence.", "Backshift: 'will' becomes 'would'.",
      QuestionKind::Reformulation {
        source: "\"I will call you tomorrow,\" he said.".into(),
        accepted: strs(&[
          "He said he would call me the next day.",
          "He said that he would call me the next day.",
          "He said he would call me the following day.",
          "He said that he would call me the following day.",
        ]),
      }),
    q("b2-para-email", 3, 15, 60, "Order the paragraphs of the email.", "Greeting, purpose, details, sign-off.",
      QuestionKind::ParagraphOrder {
        paragraphs: strs(&[
          "Dear Ms Patel,",
          "I am writing to ask about the marketing position advertised on your website.",
          "I have three years of experience running social media campaigns.",
          "I look forward to hearing from you. Kind regards, Tom",
        ]),
      }),
    q("b2-listen-opinion", 3, 12, 40, "Listen. What does the speaker think?", "'Not entirely convinced' signals doubt.",
      QuestionKind::Listening {
        transcript: "To be honest, I'm not entirely convinced the new policy will work.".into(),
        locale: "en-GB".into(),
        options: strs(&["She supports it fully.", "She has doubts.", "She wrote the policy."]),
        correct: 1,
      }),
    // C1
    q("c1-mcq-inversion", 4, 15, 40, "Rarely ___ such a convincing argument.", "Negative adverbials trigger inversion.",
      mcq(&["I have heard", "have I heard", "I heard", "did I heard"], 1)),
    q("c1-cloze-collocation", 4, 15, 40, "Complete the collocation.", "We 'draw' a conclusion.",
      cloze("It is too early to ___ any firm conclusions.", &[&["draw", "reach"]])),
    q("c1-reform-cleft", 4, 16, 55, "Rewrite starting with 'What'.", "Pseudo-cleft: What + clause + be.",
      QuestionKind::Reformulation {
        source: "I need a long holiday.".into(),
        accepted: strs(&["What I need is a long holiday."]),
      }),
    q("c1-read-inference", 4, 16, 75, "Read and infer.", "'Hardly a resounding success' is ironic understatement.",
      QuestionKind::Reading {
        passage: "The launch, attended by a handful of journalists and a dozen empty chairs, was hardly a resounding success.".into(),
        options: strs(&["The launch was popular.", "The launch was poorly attended.", "The launch was cancelled."]),
        correct: 1,
      }),
    q("c1-order-hedging", 4, 15, 45, "Put the words in order.", "Hedging with 'would appear'.",
      order(&["It", "would", "appear", "that", "the", "data", "is", "incomplete"])),
    // C2
    q("c2-mcq-nuance", 5, 20, 45, "Her apology seemed somewhat ___; nobody believed it.", "'Perfunctory' means done without real interest.",
      mcq(&["perfunctory", "profuse", "heartfelt", "perpetual"], 0)),
    q("c2-cloze-idiom", 5, 20, 45, "Complete the idiom.", "'Cut corners' means to do something poorly to save effort.",
      cloze("If you ___ corners on safety, accidents follow.", &[&["cut"]])),
    q("c2-reform-nominal", 5, 22, 60, "Rewrite using the noun form of 'decide'.", "Nominalisation is common in formal writing.",
      QuestionKind::Reformulation {
        source: "The board decided to close the factory, which shocked everyone.".into(),
        accepted: strs(&[
          "The board's decision to close the factory shocked everyone.",
          "The decision of the board to close the factory shocked everyone.",
        ]),
      }),
    q("c2-para-argument", 5, 25, 90, "Order the paragraphs of the argument.", "Claim, concession, rebuttal, conclusion.",
      QuestionKind::ParagraphOrder {
        paragraphs: strs(&[
          "Cities should prioritise cycling infrastructure.",
          "Admittedly, building lanes disrupts traffic in the short term.",
          "Yet the long-term gains in health and congestion far outweigh that cost.",
          "Investment in cycling is therefore both prudent and overdue.",
        ]),
      }),
    q("c2-listen-register", 5, 20, 50, "Listen. What is the speaker's tone?", "Understated criticism delivered politely.",
      QuestionKind::Listening {
        transcript: "With the greatest respect, I'm not sure the figures quite bear that out.".into(),
        locale: "en-GB".into(),
        options: strs(&["Enthusiastic", "Politely sceptical", "Openly hostile"]),
        correct: 1,
      }),
  ]
}
