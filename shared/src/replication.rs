pub type Validator<T> = Box<dyn Fn(&T, &str) -> bool + Send + Sync>;

// A record mirrored from a remote writer. Each proposal carries the
// sender's identity; the validator decides whether that sender may
// write. Rejected proposals vanish without an error and the last
// accepted value stays visible.
pub struct Replicated<T> {
    value: Option<T>,
    validator: Validator<T>,
    accepted: u64,
    rejected: u64,
}

impl<T> Replicated<T> {
    // Writable only by `authority`; identities compare case-insensitively.
    pub fn new(authority: &str) -> Self {
        let authority = authority.to_ascii_lowercase();
        Self::with_validator(Box::new(move |_, sender: &str| {
            sender.to_ascii_lowercase() == authority
        }))
    }

    pub fn with_validator(validator: Validator<T>) -> Self {
        Self {
            value: None,
            validator,
            accepted: 0,
            rejected: 0,
        }
    }

    pub fn propose(&mut self, proposed: T, sender: &str) -> bool {
        if (self.validator)(&proposed, sender) {
            self.value = Some(proposed);
            self.accepted += 1;
            true
        } else {
            self.rejected += 1;
            false
        }
    }

    pub fn get(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn accepted(&self) -> u64 {
        self.accepted
    }

    pub fn rejected(&self) -> u64 {
        self.rejected
    }
}
