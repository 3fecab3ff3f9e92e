/// Builds the field list for [`Registry::define_type`].
///
/// `{T}` declares a set, `[T]` a list and `(T)` a sorted set of primitive `T`.
///
/// ```
/// use antler::fields;
/// let fields = fields! { "age" => Integer, "emails" => {String}, "tasks" => [String] };
/// assert_eq!(fields.len(), 3);
/// ```
#[macro_export]
macro_rules! fields {
    ($($name:literal => $kind:tt),* $(,)?) => {
        vec![$((String::from($name), $crate::field_kind!($kind))),*]
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! field_kind {
    ({ $p:ident }) => {
        $crate::schema::FieldKind::Set($crate::schema::ElementKind::Primitive(
            $crate::schema::Primitive::$p,
        ))
    };
    ([ $p:ident ]) => {
        $crate::schema::FieldKind::List($crate::schema::ElementKind::Primitive(
            $crate::schema::Primitive::$p,
        ))
    };
    (( $p:ident )) => {
        $crate::schema::FieldKind::SortedSet($crate::schema::ElementKind::Primitive(
            $crate::schema::Primitive::$p,
        ))
    };
    ($p:ident) => {
        $crate::schema::FieldKind::Scalar($crate::schema::Primitive::$p)
    };
}
