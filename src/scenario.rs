use typed_builder::TypedBuilder;

/// The unit of work an executor runs over and over.
///
/// `action` is called once per invocation with a fresh clone of `args`, so every
/// call sees the same arguments. Anything heavy (HTTP clients, connection pools)
/// belongs in `args` or in the closure's captures, never inside the action body.
///
/// ```
/// use volley::Scenario;
///
/// let scenario = Scenario::builder()
///     .name("sum")
///     .args((2, 4))
///     .action(|(a, b): (i32, i32)| async move { Ok::<_, std::io::Error>(a + b) })
///     .build();
/// assert_eq!(scenario.name, "sum");
/// ```
#[derive(Clone, TypedBuilder)]
pub struct Scenario<Args, F> {
    #[builder(default = String::from("scenario"), setter(into))]
    pub name: String,
    pub args: Args,
    pub action: F,
}
