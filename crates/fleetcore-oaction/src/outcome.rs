/// What an action body did this tick.
pub enum Outcome {
    /// The body ran to completion; the engine should run `post_op` and
    /// propagate success through the dependency graph.
    Done,
    /// The body spawned child actions and made itself `WAITING` on them; the
    /// engine leaves the lock held and returns without propagating anything.
    /// The same action resumes (with `action.data["spawned"] = true`) once
    /// the dependency graph flips it back to `READY`.
    Pending,
}
