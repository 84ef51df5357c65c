use crate::store::{
    created_message, deleted_message, duplicate_name, updated_message, DefinitionStore,
    ScriptStore, StoreError, StoreResult, ToleranceStore,
};
use crate::types::{TaskId, TestAddress, TestDefinition, ToleranceFilters, Visibility};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, RedisResult, Script};
use tracing::debug;

/// Redis key semantics - every key the API and CLI touch is built here so the
/// two never drift.
///
/// Per task and visibility class:
/// - a list of test names, newest first
/// - a hash of test name -> JSON definition
/// - the grading script copy for that target

pub const NAMES_PREFIX: &str = "autotest:names";
pub const TESTS_PREFIX: &str = "autotest:tests";
pub const SCRIPT_PREFIX: &str = "autotest:script";
pub const TOLERANCE_PREFIX: &str = "autotest:tolerance";

/// Ordered name list for one class
pub fn names_key(task: &TaskId, visibility: Visibility) -> String {
    format!(
        "{}:{}:{}:{}",
        NAMES_PREFIX,
        task.course_code,
        task.task,
        visibility.target_name()
    )
}

/// Definition hash for one class
pub fn tests_key(task: &TaskId, visibility: Visibility) -> String {
    format!(
        "{}:{}:{}:{}",
        TESTS_PREFIX,
        task.course_code,
        task.task,
        visibility.target_name()
    )
}

pub fn script_key(task: &TaskId, target: Visibility) -> String {
    format!(
        "{}:{}:{}:{}",
        SCRIPT_PREFIX,
        task.course_code,
        task.task,
        target.target_name()
    )
}

pub fn tolerance_key(task: &TaskId) -> String {
    format!("{}:{}:{}", TOLERANCE_PREFIX, task.course_code, task.task)
}

/// Store backed by a shared Redis connection manager
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(redis_url: &str) -> RedisResult<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }

    pub fn from_connection(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    async fn load(
        &self,
        task: &TaskId,
        address: &TestAddress,
    ) -> StoreResult<Option<TestDefinition>> {
        let mut conn = self.conn.clone();
        let payload: Option<String> = conn
            .hget(tests_key(task, address.visibility), &address.name)
            .await?;
        match payload {
            Some(data) => Ok(Some(serde_json::from_str(&data)?)),
            None => Ok(None),
        }
    }
}

// Each mutation runs as one Lua script: the existence checks, the duplicate
// check and the list index lookup happen inside the same atomic step as the
// writes, so concurrent writers can never interleave with them.
//
// KEYS[1] tests hash, KEYS[2] names list; ARGV[1] name, ARGV[2] payload
const CREATE_SCRIPT: &str = r"
if redis.call('HSETNX', KEYS[1], ARGV[1], ARGV[2]) == 0 then
  return 'taken'
end
redis.call('LPUSH', KEYS[2], ARGV[1])
return 'ok'
";

// KEYS[1..2] source hash/list, KEYS[3..4] target hash/list;
// ARGV[1] source name, ARGV[2] target name, ARGV[3] payload
const UPDATE_SCRIPT: &str = r"
if redis.call('HEXISTS', KEYS[1], ARGV[1]) == 0 then
  return 'missing'
end
local same_class = KEYS[1] == KEYS[3]
if (not same_class or ARGV[1] ~= ARGV[2]) and redis.call('HEXISTS', KEYS[3], ARGV[2]) == 1 then
  return 'taken'
end
if same_class then
  if ARGV[1] ~= ARGV[2] then
    redis.call('HDEL', KEYS[1], ARGV[1])
    local index = nil
    for i, name in ipairs(redis.call('LRANGE', KEYS[2], 0, -1)) do
      if name == ARGV[1] then
        index = i - 1
        break
      end
    end
    if index then
      redis.call('LSET', KEYS[2], index, ARGV[2])
    else
      redis.call('LPUSH', KEYS[2], ARGV[2])
    end
  end
  redis.call('HSET', KEYS[1], ARGV[2], ARGV[3])
else
  redis.call('HDEL', KEYS[1], ARGV[1])
  redis.call('LREM', KEYS[2], 1, ARGV[1])
  redis.call('HSET', KEYS[3], ARGV[2], ARGV[3])
  redis.call('LPUSH', KEYS[4], ARGV[2])
end
return 'ok'
";

// KEYS[1] tests hash, KEYS[2] names list; ARGV[1] name
const DELETE_SCRIPT: &str = r"
if redis.call('HDEL', KEYS[1], ARGV[1]) == 0 then
  return 'missing'
end
redis.call('LREM', KEYS[2], 1, ARGV[1])
return 'ok'
";

/// Reply of a mutation script
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScriptReply {
    Ok,
    Missing,
    Taken,
}

impl ScriptReply {
    fn parse(reply: &str) -> StoreResult<Self> {
        match reply {
            "ok" => Ok(ScriptReply::Ok),
            "missing" => Ok(ScriptReply::Missing),
            "taken" => Ok(ScriptReply::Taken),
            other => Err(StoreError::Backend(format!(
                "unexpected script reply '{}'",
                other
            ))),
        }
    }
}

#[async_trait]
impl DefinitionStore for RedisStore {
    async fn create(&self, task: &TaskId, definition: &TestDefinition) -> StoreResult<String> {
        definition.validate().map_err(StoreError::Rejected)?;
        let mut conn = self.conn.clone();
        let payload = serde_json::to_string(definition)?;

        let reply: String = Script::new(CREATE_SCRIPT)
            .key(tests_key(task, definition.visibility))
            .key(names_key(task, definition.visibility))
            .arg(&definition.name)
            .arg(payload)
            .invoke_async(&mut conn)
            .await?;
        if ScriptReply::parse(&reply)? != ScriptReply::Ok {
            return Err(StoreError::Rejected("Test name already exists".to_string()));
        }

        debug!(task = %task, test = %definition.address(), "Test stored");
        Ok(created_message(definition))
    }

    async fn read(&self, task: &TaskId, address: &TestAddress) -> StoreResult<TestDefinition> {
        self.load(task, address).await?.ok_or_else(|| {
            StoreError::NotFound(format!(
                "Test with name '{}' not found. Aborting data fetch...",
                address.name
            ))
        })
    }

    async fn update(
        &self,
        task: &TaskId,
        address: &TestAddress,
        definition: &TestDefinition,
    ) -> StoreResult<String> {
        definition.validate().map_err(StoreError::Rejected)?;
        let mut conn = self.conn.clone();
        let payload = serde_json::to_string(definition)?;
        let target = definition.address();

        let reply: String = Script::new(UPDATE_SCRIPT)
            .key(tests_key(task, address.visibility))
            .key(names_key(task, address.visibility))
            .key(tests_key(task, target.visibility))
            .key(names_key(task, target.visibility))
            .arg(&address.name)
            .arg(&target.name)
            .arg(payload)
            .invoke_async(&mut conn)
            .await?;
        match ScriptReply::parse(&reply)? {
            ScriptReply::Ok => {}
            ScriptReply::Missing => {
                return Err(StoreError::NotFound(format!(
                    "Test with name '{}' not found. Aborting edit...",
                    address.name
                )))
            }
            ScriptReply::Taken => return Err(duplicate_name(&target.name)),
        }

        debug!(task = %task, from = %address, to = %target, "Test rewritten");
        Ok(updated_message(address, definition))
    }

    async fn delete(&self, task: &TaskId, address: &TestAddress) -> StoreResult<String> {
        let mut conn = self.conn.clone();
        let reply: String = Script::new(DELETE_SCRIPT)
            .key(tests_key(task, address.visibility))
            .key(names_key(task, address.visibility))
            .arg(&address.name)
            .invoke_async(&mut conn)
            .await?;
        if ScriptReply::parse(&reply)? == ScriptReply::Missing {
            return Err(StoreError::NotFound(format!(
                "Test with name '{}' not found. Aborting delete...",
                address.name
            )));
        }

        debug!(task = %task, test = %address, "Test removed");
        Ok(deleted_message(address))
    }

    async fn list_names(&self, task: &TaskId, visibility: Visibility) -> StoreResult<Vec<String>> {
        let mut conn = self.conn.clone();
        let names: Vec<String> = conn.lrange(names_key(task, visibility), 0, -1).await?;
        debug!(task = %task, visibility = %visibility, count = names.len(), "Listed tests");
        Ok(names)
    }
}

#[async_trait]
impl ScriptStore for RedisStore {
    async fn upload_script(
        &self,
        task: &TaskId,
        target: Visibility,
        script: &[u8],
    ) -> StoreResult<String> {
        let mut conn = self.conn.clone();
        let _: () = conn.set(script_key(task, target), script).await?;
        debug!(task = %task, target = target.target_name(), size = script.len(), "Script stored");
        Ok("Script uploaded".to_string())
    }

    async fn fetch_script(&self, task: &TaskId) -> StoreResult<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        let script: Option<Vec<u8>> = conn.get(script_key(task, Visibility::Hidden)).await?;
        Ok(script)
    }
}

#[async_trait]
impl ToleranceStore for RedisStore {
    async fn tolerance_filters(&self, task: &TaskId) -> StoreResult<ToleranceFilters> {
        let mut conn = self.conn.clone();
        let payload: Option<String> = conn.get(tolerance_key(task)).await?;
        match payload {
            Some(data) => Ok(serde_json::from_str(&data)?),
            None => Ok(ToleranceFilters::default()),
        }
    }

    async fn set_tolerance_filters(
        &self,
        task: &TaskId,
        filters: ToleranceFilters,
    ) -> StoreResult<String> {
        let mut conn = self.conn.clone();
        let payload = serde_json::to_string(&filters)?;
        let _: () = conn.set(tolerance_key(task), payload).await?;
        Ok("Tolerance filter settings saved.".to_string())
    }
}
