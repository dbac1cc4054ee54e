use crate::channel::Role;
use std::fmt;
use tandem_core::LinkError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Idle,
    Offering,
    Answering,
    Connected,
    Closed,
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LinkState::Idle => "idle",
            LinkState::Offering => "offering",
            LinkState::Answering => "answering",
            LinkState::Connected => "connected",
            LinkState::Closed => "closed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkInput {
    Start,
    RemoteOffer,
    RemoteAnswer,
    RemoteCandidate,
    ChannelOpen,
    Close,
}

impl LinkInput {
    fn name(self) -> &'static str {
        match self {
            LinkInput::Start => "start",
            LinkInput::RemoteOffer => "remote offer",
            LinkInput::RemoteAnswer => "remote answer",
            LinkInput::RemoteCandidate => "remote candidate",
            LinkInput::ChannelOpen => "channel open",
            LinkInput::Close => "close",
        }
    }
}

/// Side effect the link actor performs for an accepted input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkAction {
    CreateOffer,
    AnswerOffer,
    ApplyAnswer,
    ApplyCandidate,
    AnnounceOpen,
    Release,
    Nothing,
}

/// Pure transition table of a peer link.
pub fn transition(
    state: LinkState,
    role: Role,
    input: LinkInput,
) -> Result<(LinkState, LinkAction), LinkError> {
    use LinkAction as A;
    use LinkInput as I;
    use LinkState as S;

    let next = match (state, role, input) {
        (S::Closed, _, I::Close) => (S::Closed, A::Nothing),
        (S::Closed, _, _) => return Err(unexpected(state, input)),
        (_, _, I::Close) => (S::Closed, A::Release),

        (S::Idle, Role::Initiator, I::Start) => (S::Offering, A::CreateOffer),
        (S::Idle, Role::Responder, I::RemoteOffer) => (S::Answering, A::AnswerOffer),
        (S::Offering, Role::Initiator, I::RemoteAnswer) => (S::Connected, A::ApplyAnswer),
        (S::Answering, Role::Responder, I::ChannelOpen) => (S::Connected, A::AnnounceOpen),
        (S::Connected, Role::Initiator, I::ChannelOpen) => (S::Connected, A::AnnounceOpen),

        (S::Offering | S::Answering | S::Connected, _, I::RemoteCandidate) => {
            (state, A::ApplyCandidate)
        }

        _ => return Err(unexpected(state, input)),
    };
    Ok(next)
}

fn unexpected(state: LinkState, input: LinkInput) -> LinkError {
    LinkError::UnexpectedInput {
        state: state.to_string(),
        input: input.name(),
    }
}
