use crate::models::Difficulty;

pub struct QuestionSeed {
    pub question: &'static str,
    pub answer: &'static str,
    pub difficulty: Difficulty,
}

pub struct TopicSeed {
    pub name: &'static str,
    pub description: &'static str,
    pub questions: &'static [QuestionSeed],
}

pub const DEFAULT_LEARNER: &str = "learner";

pub const STARTER_TOPICS: &[TopicSeed] = &[
    TopicSeed {
        name: "Rust",
        description: "Ownership, borrowing and the type system",
        questions: &[
            QuestionSeed {
                question: "What keyword makes a binding mutable?",
                answer: "mut",
                difficulty: Difficulty::Easy,
            },
            QuestionSeed {
                question: "How many mutable references to a value may exist at once?",
                answer: "One",
                difficulty: Difficulty::Medium,
            },
            QuestionSeed {
                question: "Which trait must a type implement to be sent across threads?",
                answer: "Send",
                difficulty: Difficulty::Medium,
            },
            QuestionSeed {
                question: "What does the `?` operator do on an `Err` value?",
                answer: "Returns early, converting the error with From",
                difficulty: Difficulty::Hard,
            },
        ],
    },
    TopicSeed {
        name: "SQL",
        description: "Relational queries",
        questions: &[
            QuestionSeed {
                question: "Which clause filters rows after aggregation?",
                answer: "HAVING",
                difficulty: Difficulty::Medium,
            },
            QuestionSeed {
                question: "Which join keeps unmatched rows from the left table?",
                answer: "LEFT JOIN",
                difficulty: Difficulty::Easy,
            },
            QuestionSeed {
                question: "What isolation level prevents phantom reads?",
                answer: "SERIALIZABLE",
                difficulty: Difficulty::Hard,
            },
        ],
    },
    TopicSeed {
        name: "Networking",
        description: "Protocols and ports",
        questions: &[
            QuestionSeed {
                question: "What is the default port for HTTPS?",
                answer: "443",
                difficulty: Difficulty::Easy,
            },
            QuestionSeed {
                question: "Which transport protocol does DNS use for ordinary queries?",
                answer: "UDP",
                difficulty: Difficulty::Medium,
            },
        ],
    },
];
