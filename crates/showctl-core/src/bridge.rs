//! Late-binding dispatch: the bridge capability interface and the
//! role-tagging dispatcher.
//!
//! The external application exposes no compiled interface, only a member
//! set discoverable at runtime. Everything above this module depends on the
//! [`Bridge`] trait alone, never on a concrete binding mechanism.

use crate::error::{CallError, DispatchError};
use crate::value::{ObjectHandle, Role, Value};

/// Capability interface over one binding to the external application.
///
/// All calls are blocking and non-cancellable; the caller is responsible
/// for the single-caller discipline the external object model requires.
pub trait Bridge: Send {
    /// Human-readable name of the target application, for diagnostics.
    fn app_name(&self) -> &str;

    /// Attach to an already-running instance, returning its root handle.
    fn attach(&mut self) -> Result<ObjectHandle, CallError>;

    /// Start a new instance, returning its root handle.
    fn launch(&mut self) -> Result<ObjectHandle, CallError>;

    fn get_property(&mut self, target: &ObjectHandle, member: &str) -> Result<Value, CallError>;

    fn set_property(
        &mut self,
        target: &ObjectHandle,
        member: &str,
        value: Value,
    ) -> Result<(), CallError>;

    fn invoke(
        &mut self,
        target: &ObjectHandle,
        member: &str,
        args: &[Value],
    ) -> Result<Value, CallError>;
}

/// Invokes named members on opaque handles, tagging every failure with the
/// target's logical role and the member name.
///
/// The dispatcher caches nothing: every call goes to the bridge, and every
/// returned value is handed through unchanged in shape.
pub struct Dispatcher {
    bridge: Box<dyn Bridge>,
}

impl Dispatcher {
    pub fn new(bridge: Box<dyn Bridge>) -> Self {
        Self { bridge }
    }

    pub fn app_name(&self) -> &str {
        self.bridge.app_name()
    }

    fn tag(role: Role, member: &str, source: CallError) -> DispatchError {
        DispatchError {
            role,
            member: member.to_string(),
            source,
        }
    }

    pub fn get(
        &mut self,
        role: Role,
        target: &ObjectHandle,
        member: &str,
    ) -> Result<Value, DispatchError> {
        self.bridge
            .get_property(target, member)
            .map_err(|e| Self::tag(role, member, e))
    }

    pub fn set(
        &mut self,
        role: Role,
        target: &ObjectHandle,
        member: &str,
        value: Value,
    ) -> Result<(), DispatchError> {
        self.bridge
            .set_property(target, member, value)
            .map_err(|e| Self::tag(role, member, e))
    }

    pub fn invoke(
        &mut self,
        role: Role,
        target: &ObjectHandle,
        member: &str,
        args: &[Value],
    ) -> Result<Value, DispatchError> {
        self.bridge
            .invoke(target, member, args)
            .map_err(|e| Self::tag(role, member, e))
    }

    /// Get a property and coerce it to a flag (bool or 0/1 integer).
    pub fn get_flag(
        &mut self,
        role: Role,
        target: &ObjectHandle,
        member: &str,
    ) -> Result<bool, DispatchError> {
        let value = self.get(role, target, member)?;
        value
            .as_flag()
            .ok_or_else(|| Self::tag(role, member, mismatch("flag", &value)))
    }

    pub fn get_int(
        &mut self,
        role: Role,
        target: &ObjectHandle,
        member: &str,
    ) -> Result<i32, DispatchError> {
        let value = self.get(role, target, member)?;
        value
            .as_int()
            .ok_or_else(|| Self::tag(role, member, mismatch("int", &value)))
    }

    pub fn get_str(
        &mut self,
        role: Role,
        target: &ObjectHandle,
        member: &str,
    ) -> Result<String, DispatchError> {
        let value = self.get(role, target, member)?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| Self::tag(role, member, mismatch("string", &value)))
    }

    /// Invoke a member and coerce the result to an integer.
    pub fn invoke_int(
        &mut self,
        role: Role,
        target: &ObjectHandle,
        member: &str,
        args: &[Value],
    ) -> Result<i32, DispatchError> {
        let value = self.invoke(role, target, member, args)?;
        value
            .as_int()
            .ok_or_else(|| Self::tag(role, member, mismatch("int", &value)))
    }

    /// Invoke a member and coerce the result to a flag (bool or 0/1 integer).
    pub fn invoke_flag(
        &mut self,
        role: Role,
        target: &ObjectHandle,
        member: &str,
        args: &[Value],
    ) -> Result<bool, DispatchError> {
        let value = self.invoke(role, target, member, args)?;
        value
            .as_flag()
            .ok_or_else(|| Self::tag(role, member, mismatch("flag", &value)))
    }

    /// Invoke a member that resolves an object.
    ///
    /// A `Null` result means the object does not exist, which is routine
    /// for lookups, so it maps to `None` rather than an error.
    pub fn invoke_handle(
        &mut self,
        role: Role,
        target: &ObjectHandle,
        member: &str,
        args: &[Value],
    ) -> Result<Option<ObjectHandle>, DispatchError> {
        match self.invoke(role, target, member, args)? {
            Value::Null => Ok(None),
            Value::Object(handle) => Ok(Some(handle)),
            other => Err(Self::tag(role, member, mismatch("object", &other))),
        }
    }
}

fn mismatch(expected: &'static str, found: &Value) -> CallError {
    CallError::TypeMismatch {
        expected,
        found: found.kind(),
    }
}
